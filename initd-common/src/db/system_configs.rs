//! System configuration records
//!
//! Each write appends a new row; readers always take the newest row of a
//! given type. The row's creation time doubles as the configuration version
//! token handed to clients.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::fmt;

use crate::system::SystemConfigFile;
use crate::{Error, Result};

/// Kind of configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemConfigType {
    /// Core system configuration merged at startup
    Core,
    /// Pro service configuration
    Pro,
}

impl SystemConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemConfigType::Core => "core",
            SystemConfigType::Pro => "pro",
        }
    }
}

impl fmt::Display for SystemConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration record read from the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSystemConfig {
    pub id: i64,
    pub config_type: SystemConfigType,
    pub value: SystemConfigFile,
    /// Unix epoch milliseconds
    pub create_time: i64,
}

impl StoredSystemConfig {
    /// Version token for this record
    pub fn buffer_id(&self) -> String {
        self.create_time.to_string()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.create_time)
    }
}

/// Load the newest record of `config_type`, if any
pub async fn latest_system_config(
    pool: &SqlitePool,
    config_type: SystemConfigType,
) -> Result<Option<StoredSystemConfig>> {
    let row: Option<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, value, create_time FROM system_configs \
         WHERE config_type = ? \
         ORDER BY create_time DESC, id DESC \
         LIMIT 1",
    )
    .bind(config_type.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id, value, create_time)) => {
            let value = SystemConfigFile::from_json_str(&value).map_err(|e| {
                Error::Config(format!(
                    "system_configs row {} ({}) holds invalid JSON: {}",
                    id, config_type, e
                ))
            })?;
            Ok(Some(StoredSystemConfig {
                id,
                config_type,
                value,
                create_time,
            }))
        }
        None => Ok(None),
    }
}

/// Append a new record stamped with the current time
pub async fn insert_system_config(
    pool: &SqlitePool,
    config_type: SystemConfigType,
    value: &SystemConfigFile,
) -> Result<StoredSystemConfig> {
    insert_system_config_at(pool, config_type, value, Utc::now().timestamp_millis()).await
}

/// Append a new record with an explicit creation time (epoch milliseconds)
pub async fn insert_system_config_at(
    pool: &SqlitePool,
    config_type: SystemConfigType,
    value: &SystemConfigFile,
    create_time: i64,
) -> Result<StoredSystemConfig> {
    let json = serde_json::to_string(value)?;

    let id = sqlx::query(
        "INSERT INTO system_configs (config_type, value, create_time) VALUES (?, ?, ?)",
    )
    .bind(config_type.as_str())
    .bind(&json)
    .bind(create_time)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(StoredSystemConfig {
        id,
        config_type,
        value: value.clone(),
        create_time,
    })
}
