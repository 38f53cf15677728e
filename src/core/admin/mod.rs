//! Administrative operations
//!
//! Superadmin-only account management and audit log access.

pub mod api;
pub mod service;

pub use api::admin_routes;
pub use service::{AdminService, NewAdmin, ensure_superadmin};
