//! Configuration precedence rules

use serde_json::Value;

use super::{FeConfigs, SystemConfig, SystemConfigFile};

/// Merge built-in defaults, the file config and the database config
///
/// `feConfigs` is merged key by key with `defaults < file < db`, then `isPlus`
/// is forced to `is_plus`. `systemEnv` is merged key by key with `file < db`.
/// Every other section is taken whole from the database when present (an empty
/// list counts as present) and from the file otherwise.
pub fn merge_system_config(
    defaults: &FeConfigs,
    file: SystemConfigFile,
    db: SystemConfigFile,
    is_plus: bool,
) -> SystemConfig {
    let mut fe_configs = defaults.clone();
    overlay(&mut fe_configs, file.fe_configs);
    overlay(&mut fe_configs, db.fe_configs);
    fe_configs.insert("isPlus".to_string(), Value::Bool(is_plus));

    let mut system_env = file.system_env.unwrap_or_default();
    overlay(&mut system_env, db.system_env);

    SystemConfig {
        fe_configs,
        system_env,
        sub_plans: db.sub_plans.or(file.sub_plans),
        llm_models: db.llm_models.or(file.llm_models).unwrap_or_default(),
        vector_models: db.vector_models.or(file.vector_models).unwrap_or_default(),
        re_rank_models: db.re_rank_models.or(file.re_rank_models).unwrap_or_default(),
        audio_speech_models: db
            .audio_speech_models
            .or(file.audio_speech_models)
            .unwrap_or_default(),
        whisper_model: db.whisper_model.or(file.whisper_model),
    }
}

fn overlay(base: &mut FeConfigs, layer: Option<FeConfigs>) {
    if let Some(layer) = layer {
        base.extend(layer);
    }
}
