//! Database initialization and configuration records

pub mod init;
pub mod system_configs;

pub use init::*;
pub use system_configs::*;
