//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types. The server wraps
//! them with framework-specific middleware (axum).

pub mod auth;

pub use auth::{
    basic_header_value, check_authorization, parse_basic_header, verify_credentials,
    ApiAuthError,
};
