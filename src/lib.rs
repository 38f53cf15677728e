//! Warden - Authentication and Authorization Core
//!
//! Credential verification with lockout, revocable session-backed tokens,
//! role-gated routes, per-client login rate limiting and superadmin account
//! administration, served over axum with SQLite persistence.

pub mod core;
