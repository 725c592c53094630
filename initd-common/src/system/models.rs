//! System configuration types
//!
//! Field names follow the camelCase JSON layout of `config.json` so that the
//! file, the database record and the HTTP response share one shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Front-end configuration (open-ended JSON object)
pub type FeConfigs = Map<String, Value>;

/// Server-side environment settings (open-ended JSON object)
pub type SystemEnv = Map<String, Value>;

/// Model category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Llm,
    Embedding,
    Rerank,
    Tts,
    Stt,
}

impl ModelType {
    pub const ALL: [ModelType; 5] = [
        ModelType::Llm,
        ModelType::Embedding,
        ModelType::Rerank,
        ModelType::Tts,
        ModelType::Stt,
    ];
}

/// One configured model
///
/// Operational fields (prompts, weights, upstream endpoints and credentials)
/// are typed so they can be redacted before leaving the server. Any other
/// key is carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemModelItem {
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,

    #[serde(
        rename = "customCQPrompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_cq_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_extract_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_system_chat_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_map: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_auth: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemModelItem {
    /// Copy with every operational field cleared
    pub fn redacted(&self) -> Self {
        Self {
            custom_cq_prompt: None,
            custom_extract_prompt: None,
            default_system_chat_prompt: None,
            field_map: None,
            default_config: None,
            weight: None,
            db_config: None,
            query_config: None,
            request_url: None,
            request_auth: None,
            ..self.clone()
        }
    }

    /// Models are active unless explicitly disabled
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    fn tagged(&self, section: ModelType) -> Self {
        let mut item = self.clone();
        item.model_type.get_or_insert(section);
        item
    }
}

/// Configuration as stored in `config.json` or a database record
///
/// Every section is optional; an absent or `null` section falls through to
/// the next lower-priority source during merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fe_configs: Option<FeConfigs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_env: Option<SystemEnv>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_plans: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_models: Option<Vec<SystemModelItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_models: Option<Vec<SystemModelItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_rank_models: Option<Vec<SystemModelItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_speech_models: Option<Vec<SystemModelItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_model: Option<SystemModelItem>,
}

impl SystemConfigFile {
    /// Parse a configuration document
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Merged system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub fe_configs: FeConfigs,
    pub system_env: SystemEnv,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_plans: Option<Value>,
    pub llm_models: Vec<SystemModelItem>,
    pub vector_models: Vec<SystemModelItem>,
    pub re_rank_models: Vec<SystemModelItem>,
    pub audio_speech_models: Vec<SystemModelItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_model: Option<SystemModelItem>,
}

impl SystemConfig {
    /// All active models, each tagged with the type of the section it came from
    pub fn active_models(&self) -> Vec<SystemModelItem> {
        let sections: [(ModelType, &[SystemModelItem]); 4] = [
            (ModelType::Llm, &self.llm_models),
            (ModelType::Embedding, &self.vector_models),
            (ModelType::Rerank, &self.re_rank_models),
            (ModelType::Tts, &self.audio_speech_models),
        ];

        sections
            .into_iter()
            .flat_map(|(section, models)| models.iter().map(move |m| m.tagged(section)))
            .chain(self.whisper_model.iter().map(|m| m.tagged(ModelType::Stt)))
            .filter(SystemModelItem::is_active)
            .collect()
    }

    /// Default model per type
    pub fn default_models(&self) -> DefaultModels {
        DefaultModels::from_active(&self.active_models())
    }
}

/// Default model for each model type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultModels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<SystemModelItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<SystemModelItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<SystemModelItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<SystemModelItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stt: Option<SystemModelItem>,
}

impl DefaultModels {
    /// Pick, per type, the first model flagged `isDefault`, else the first of that type
    pub fn from_active(active: &[SystemModelItem]) -> Self {
        let pick = |ty: ModelType| {
            let mut of_type = active.iter().filter(|m| m.model_type == Some(ty));
            let first = of_type.clone().next();
            of_type
                .find(|m| m.is_default == Some(true))
                .or(first)
                .cloned()
        };

        Self {
            llm: pick(ModelType::Llm),
            embedding: pick(ModelType::Embedding),
            rerank: pick(ModelType::Rerank),
            tts: pick(ModelType::Tts),
            stt: pick(ModelType::Stt),
        }
    }

    /// Copy with every contained model redacted
    pub fn redacted(&self) -> Self {
        Self {
            llm: self.llm.as_ref().map(SystemModelItem::redacted),
            embedding: self.embedding.as_ref().map(SystemModelItem::redacted),
            rerank: self.rerank.as_ref().map(SystemModelItem::redacted),
            tts: self.tts.as_ref().map(SystemModelItem::redacted),
            stt: self.stt.as_ref().map(SystemModelItem::redacted),
        }
    }
}
