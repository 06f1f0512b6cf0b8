//! # snailtrack Common Library
//!
//! Shared code for the snailtrack service and tools including:
//! - Database schema, initialization and row models
//! - Configuration loading and root folder resolution
//! - Basic-Auth credential checks
//! - Embedding byte codec

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod embedding;
pub mod error;

pub use error::{Error, Result};
