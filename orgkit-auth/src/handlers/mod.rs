//! HTTP handlers.

pub mod audit;
pub mod auth;
pub mod roles;
