//! Core authentication and authorization services

pub mod admin;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod pagination;
pub mod rate_limiter;
pub mod server;
pub mod sweeper;
