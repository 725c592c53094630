//! System configuration model
//!
//! A configuration arrives from two places, the local `config.json` and the
//! newest database record, and is merged into a single [`SystemConfig`] with
//! precedence `defaults < file < database`.

mod defaults;
mod merge;
mod models;

pub use defaults::default_fe_configs;
pub use merge::merge_system_config;
pub use models::{
    DefaultModels, FeConfigs, ModelType, SystemConfig, SystemConfigFile, SystemEnv,
    SystemModelItem,
};
