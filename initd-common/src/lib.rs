//! # initd Common Library
//!
//! Shared code for the initd service:
//! - Error types
//! - Bootstrap configuration loading (TOML)
//! - Configuration record storage (SQLite)
//! - System configuration model and merge rules

pub mod config;
pub mod db;
pub mod error;
pub mod system;

pub use error::{Error, Result};
pub use system::{SystemConfig, SystemConfigFile, SystemModelItem};
