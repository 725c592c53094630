//! Init data endpoint
//!
//! Clients send the `bufferId` they last received. When it still matches the
//! server's token only the token and version are returned; otherwise the full
//! front-end payload is sent with operational model fields redacted.

use axum::extract::{Query, State};
use axum::Json;
use initd_common::system::{DefaultModels, FeConfigs};
use initd_common::SystemModelItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::response::{json_ok, ApiResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::SystemState;
use crate::AppState;

/// Query parameters for `getInitData`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitDataQuery {
    pub buffer_id: Option<String>,
}

/// Init data payload
///
/// A cache hit carries only `bufferId` and `systemVersion`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitDataResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fe_configs: Option<FeConfigs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_plans: Option<Value>,
    pub system_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_model_list: Option<Vec<SystemModelItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_models: Option<DefaultModels>,
}

/// GET /api/common/system/getInitData
pub async fn get_init_data(
    State(state): State<AppState>,
    Query(query): Query<InitDataQuery>,
) -> ApiResult<Json<ApiResponse<InitDataResponse>>> {
    Ok(json_ok(build_init_data(
        &state.system,
        query.buffer_id.as_deref(),
    )?))
}

/// Build the init data payload for a client holding `client_buffer_id`
///
/// The published snapshot is read once so the payload always belongs to a
/// single configuration and its token.
pub fn build_init_data(
    system: &SystemState,
    client_buffer_id: Option<&str>,
) -> Result<InitDataResponse, ApiError> {
    let system_version = system.system_version();
    let snapshot = system.snapshot();
    let server_buffer_id = snapshot.as_ref().and_then(|s| s.buffer_id.clone());

    let cache_hit = matches!(
        (client_buffer_id, server_buffer_id.as_deref()),
        (Some(client), Some(server)) if !client.is_empty() && client == server
    );

    if cache_hit {
        debug!("Init data cache hit for bufferId {:?}", server_buffer_id);
        return Ok(InitDataResponse {
            buffer_id: server_buffer_id,
            system_version,
            ..Default::default()
        });
    }

    let snapshot = snapshot.ok_or(ApiError::NotInitialized)?;

    let active_model_list = snapshot
        .active_models
        .iter()
        .map(SystemModelItem::redacted)
        .collect();

    Ok(InitDataResponse {
        buffer_id: server_buffer_id,
        fe_configs: Some(snapshot.config.fe_configs.clone()),
        sub_plans: snapshot.config.sub_plans.clone(),
        system_version,
        active_model_list: Some(active_model_list),
        default_models: Some(snapshot.default_models.redacted()),
    })
}
