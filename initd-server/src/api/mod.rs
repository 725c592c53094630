//! HTTP API handlers for initd-server

pub mod buildinfo;
pub mod health;
pub mod init_data;
pub mod response;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use init_data::get_init_data;
