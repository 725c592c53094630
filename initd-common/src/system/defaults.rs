//! Built-in front-end configuration defaults

use serde_json::json;

use super::FeConfigs;

/// Front-end defaults, the lowest-priority layer of `feConfigs`
pub fn default_fe_configs() -> FeConfigs {
    let value = json!({
        "show_emptyChat": true,
        "show_git": true,
        "docUrl": "https://doc.fastgpt.in",
        "openAPIDocUrl": "https://doc.fastgpt.in/docs/development/openapi",
        "systemTitle": "YiLiao.AI",
        "concatMd": "关于我们: [YiLiao.AI](https://dataclubs.com/#about)",
        "limit": {
            "exportDatasetLimitMinutes": 0,
            "websiteSyncLimitMinuted": 0
        },
        "scripts": [],
        "favicon": "/favicon.ico",
        "uploadFileMaxSize": 500
    });

    match value {
        serde_json::Value::Object(map) => map,
        _ => FeConfigs::new(),
    }
}
