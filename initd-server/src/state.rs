//! Process-wide system state
//!
//! Holds the merged configuration and everything derived from it as one
//! immutable [`ConfigSnapshot`]. Written once at startup (and on reload), read
//! on every request.
//!
//! # Usage
//!
//! ```rust
//! use initd_server::state::SYSTEM_STATE;
//!
//! let version = SYSTEM_STATE.system_version();
//! assert_eq!(version, "0.0.0");
//! ```

use initd_common::system::{DefaultModels, FeConfigs, SystemConfig};
use initd_common::SystemModelItem;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Version reported before any version has been loaded
pub const FALLBACK_SYSTEM_VERSION: &str = "0.0.0";

/// Global system state singleton
pub static SYSTEM_STATE: Lazy<Arc<SystemState>> = Lazy::new(|| Arc::new(SystemState::new()));

/// A published configuration with its derived model lists and version token
///
/// Readers take the whole snapshot at once, so a payload never mixes two
/// configurations.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub config: SystemConfig,
    pub active_models: Vec<SystemModelItem>,
    pub default_models: DefaultModels,
    /// Creation time (ms) of the database record the config was merged from
    pub record_time: Option<String>,
    /// Number of content changes published under the same `record_time`
    pub revision: u32,
    /// Token handed to clients; `None` when there is no database record
    pub buffer_id: Option<String>,
}

impl ConfigSnapshot {
    fn new(config: SystemConfig, record_time: Option<String>, revision: u32) -> Self {
        let active_models = config.active_models();
        let default_models = DefaultModels::from_active(&active_models);
        let buffer_id = record_time.as_ref().map(|time| match revision {
            0 => time.clone(),
            n => format!("{}.{}", time, n),
        });

        Self {
            config,
            active_models,
            default_models,
            record_time,
            revision,
            buffer_id,
        }
    }
}

/// Cached configuration plus the initialization guard
#[derive(Debug, Default)]
pub struct SystemState {
    initd: AtomicBool,
    snapshot: RwLock<Option<Arc<ConfigSnapshot>>>,
    system_version: RwLock<Option<String>>,
}

// A panic while holding one of these locks cannot leave a half-written value:
// every write is a single assignment.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl SystemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the initialization guard
    ///
    /// Returns `false` when an initialization is already running or has
    /// completed; the caller must not initialize in that case.
    pub fn try_begin_init(&self) -> bool {
        self.initd
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the guard after a failed initialization
    pub fn reset_init(&self) {
        self.initd.store(false, Ordering::Release);
    }

    /// Mark initialization complete without claiming the guard
    pub fn mark_initd(&self) {
        self.initd.store(true, Ordering::Release);
    }

    pub fn is_initd(&self) -> bool {
        self.initd.load(Ordering::Acquire)
    }

    /// Publish a merged configuration loaded from the record created at `record_time`
    ///
    /// The version token changes whenever the published content changes: a new
    /// record resets the revision, and a different config under the same record
    /// bumps it. Republishing identical content keeps the token.
    pub fn publish(
        &self,
        config: SystemConfig,
        record_time: Option<String>,
    ) -> Arc<ConfigSnapshot> {
        let mut current = write(&self.snapshot);

        let revision = match current.as_deref() {
            Some(prev) if prev.record_time == record_time && prev.config == config => prev.revision,
            Some(prev) if prev.record_time == record_time => prev.revision + 1,
            _ => 0,
        };

        let snapshot = Arc::new(ConfigSnapshot::new(config, record_time, revision));
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Currently published configuration, if any
    pub fn snapshot(&self) -> Option<Arc<ConfigSnapshot>> {
        read(&self.snapshot).clone()
    }

    pub fn has_config(&self) -> bool {
        read(&self.snapshot).is_some()
    }

    pub fn fe_configs(&self) -> Option<FeConfigs> {
        self.snapshot().map(|s| s.config.fe_configs.clone())
    }

    pub fn active_models(&self) -> Vec<SystemModelItem> {
        self.snapshot()
            .map(|s| s.active_models.clone())
            .unwrap_or_default()
    }

    pub fn buffer_id(&self) -> Option<String> {
        self.snapshot().and_then(|s| s.buffer_id.clone())
    }

    pub fn set_system_version(&self, version: impl Into<String>) {
        *write(&self.system_version) = Some(version.into());
    }

    pub fn has_system_version(&self) -> bool {
        read(&self.system_version).is_some()
    }

    /// Loaded system version, or `0.0.0` when none has been loaded
    pub fn system_version(&self) -> String {
        read(&self.system_version)
            .clone()
            .unwrap_or_else(|| FALLBACK_SYSTEM_VERSION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_title(title: &str) -> SystemConfig {
        serde_json::from_value(json!({
            "feConfigs": { "systemTitle": title },
            "systemEnv": {},
            "llmModels": [{ "model": "chat" }],
            "vectorModels": [{ "model": "embed" }],
            "reRankModels": [],
            "audioSpeechModels": []
        }))
        .unwrap()
    }

    #[test]
    fn test_init_guard_is_claimed_once() {
        let state = SystemState::new();

        assert!(!state.is_initd());
        assert!(state.try_begin_init());
        assert!(state.is_initd());
        assert!(!state.try_begin_init(), "second claim must fail");

        state.reset_init();
        assert!(state.try_begin_init(), "claim succeeds again after reset");
    }

    #[test]
    fn test_init_guard_under_contention() {
        let state = Arc::new(SystemState::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.try_begin_init())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_version_fallback() {
        let state = SystemState::new();
        assert_eq!(state.system_version(), "0.0.0");
        assert!(!state.has_system_version());

        state.set_system_version("4.8.1");
        assert_eq!(state.system_version(), "4.8.1");
    }

    #[test]
    fn test_publish_derives_models() {
        let state = SystemState::new();
        assert!(!state.has_config());
        assert!(state.active_models().is_empty());

        state.publish(config_with_title("t"), None);

        let snapshot = state.snapshot().unwrap();
        assert!(state.has_config());
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "t");
        assert_eq!(snapshot.active_models.len(), 2);
        assert_eq!(snapshot.default_models.llm.as_ref().unwrap().model, "chat");
        assert!(snapshot.config.sub_plans.is_none());
        assert_eq!(snapshot.buffer_id, None);
    }

    #[test]
    fn test_buffer_id_follows_record_and_content() {
        let state = SystemState::new();

        state.publish(config_with_title("a"), Some("42".to_string()));
        assert_eq!(state.buffer_id().as_deref(), Some("42"));

        // Same content under the same record keeps the token
        state.publish(config_with_title("a"), Some("42".to_string()));
        assert_eq!(state.buffer_id().as_deref(), Some("42"));

        // Changed content under the same record moves it
        state.publish(config_with_title("b"), Some("42".to_string()));
        assert_eq!(state.buffer_id().as_deref(), Some("42.1"));
        state.publish(config_with_title("c"), Some("42".to_string()));
        assert_eq!(state.buffer_id().as_deref(), Some("42.2"));

        // A new record starts over
        state.publish(config_with_title("c"), Some("43".to_string()));
        assert_eq!(state.buffer_id().as_deref(), Some("43"));
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_publish() {
        let state = SystemState::new();
        state.publish(config_with_title("old"), Some("1".to_string()));
        let held = state.snapshot().unwrap();

        state.publish(config_with_title("new"), Some("2".to_string()));

        assert_eq!(held.config.fe_configs["systemTitle"], "old");
        assert_eq!(held.buffer_id.as_deref(), Some("1"));
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "new");
    }
}
