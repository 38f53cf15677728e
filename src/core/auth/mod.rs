//! Authentication module for Warden
//!
//! This module provides authentication functionality including:
//! - JWT token generation and validation
//! - Password verification with failed-attempt lockout
//! - Revocable sessions backing every token
//! - Access-control middleware for protected routes
//! - REST API endpoints for auth operations

pub mod api;
pub mod client_info;
pub mod gate;
pub mod jwt;
pub mod locks;
pub mod service;

pub use client_info::{ClientInfo, ClientIpSource};
pub use gate::{RoleSet, authorize, require_auth, require_role};
pub use jwt::{Claims, IssuedToken, JwtConfig, JwtError, JwtService, SecretSource};
pub use locks::AccountLocks;
pub use service::{AuthContext, AuthError, AuthPolicy, AuthService};
