//! System initialization
//!
//! Loads the system configuration once per process: the newest database record
//! and the local config file are fetched concurrently, merged, and published to
//! [`SystemState`]. The system version is resolved alongside.

use initd_common::db::{latest_system_config, SystemConfigType};
use initd_common::system::{default_fe_configs, merge_system_config};
use initd_common::{Error, Result, SystemConfigFile};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::state::{SystemState, FALLBACK_SYSTEM_VERSION};

/// Name of the system config file inside the config directory
pub const SYSTEM_CONFIG_FILE: &str = "config.json";

/// Settings the initializer needs from the bootstrap configuration
#[derive(Debug, Clone)]
pub struct InitSettings {
    pub config_dir: PathBuf,
    pub version_manifest: Option<PathBuf>,
    pub is_plus: bool,
    pub dev_mode: bool,
}

/// Result of [`SystemInitializer::get_init_config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Configuration loaded and published
    Initialized,
    /// Another initialization is running or has completed; nothing was done
    AlreadyInitialized,
    /// Loading failed but a previously loaded configuration is still served
    Degraded,
}

/// Loads and publishes the system configuration
#[derive(Clone)]
pub struct SystemInitializer {
    state: Arc<SystemState>,
    db: SqlitePool,
    settings: InitSettings,
}

impl SystemInitializer {
    pub fn new(state: Arc<SystemState>, db: SqlitePool, settings: InitSettings) -> Self {
        Self {
            state,
            db,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<SystemState> {
        &self.state
    }

    /// Initialize the system configuration at most once
    ///
    /// On failure the guard is released so a later call can retry. If no
    /// configuration has ever been loaded the failure is fatal and
    /// [`Error::InitFailed`] is returned.
    pub async fn get_init_config(&self) -> Result<InitOutcome> {
        if !self.state.try_begin_init() {
            debug!("System config already initialized, skipping");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let result = tokio::try_join!(self.init_system_config(), self.load_system_version());

        match result {
            Ok(_) => {
                info!(
                    "System initialized: version {}, {} active models",
                    self.state.system_version(),
                    self.state.active_models().len()
                );
                Ok(InitOutcome::Initialized)
            }
            Err(e) => {
                error!("Load init config error: {}", e);
                self.state.reset_init();

                if self.state.has_config() {
                    Ok(InitOutcome::Degraded)
                } else {
                    Err(Error::InitFailed(e.to_string()))
                }
            }
        }
    }

    /// Reload configuration into an already-initialized process
    ///
    /// The previously published configuration stays in place if loading fails.
    pub async fn reload(&self) -> Result<()> {
        info!("Reloading system config");
        self.init_system_config().await?;
        self.state.mark_initd();
        Ok(())
    }

    /// Load, merge and publish the system configuration
    pub async fn init_system_config(&self) -> Result<()> {
        let (stored, file_content) = tokio::try_join!(
            latest_system_config(&self.db, SystemConfigType::Core),
            self.read_config_data(SYSTEM_CONFIG_FILE),
        )?;

        let file_config = SystemConfigFile::from_json_str(&file_content)
            .map_err(|e| Error::Config(format!("Invalid {}: {}", SYSTEM_CONFIG_FILE, e)))?;

        let (db_config, record_time) = match stored {
            Some(record) => {
                let record_time = record.buffer_id();
                (record.value, Some(record_time))
            }
            None => {
                debug!("No system config record in database, using file only");
                (SystemConfigFile::default(), None)
            }
        };

        let config = merge_system_config(
            &default_fe_configs(),
            file_config,
            db_config,
            self.settings.is_plus,
        );

        let snapshot = self.state.publish(config, record_time);
        let config = &snapshot.config;

        info!(
            buffer_id = snapshot.buffer_id.as_deref().unwrap_or("-"),
            revision = snapshot.revision,
            llm_models = config.llm_models.len(),
            vector_models = config.vector_models.len(),
            rerank_models = config.re_rank_models.len(),
            audio_speech_models = config.audio_speech_models.len(),
            has_sub_plans = config.sub_plans.is_some(),
            "System config loaded"
        );

        Ok(())
    }

    /// Read a config file from the config directory
    ///
    /// In dev mode `<stem>.local.json` is preferred when it exists.
    pub async fn read_config_data(&self, name: &str) -> Result<String> {
        let path = resolve_config_path(&self.settings.config_dir, name, self.settings.dev_mode);
        debug!("Reading config data from {}", path.display());

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Config(format!("Read {} failed: {}", path.display(), e))
        })
    }

    /// Resolve the system version once; never fails
    pub async fn load_system_version(&self) -> Result<()> {
        if self.state.has_system_version() {
            return Ok(());
        }

        let version = if self.settings.dev_mode {
            env!("CARGO_PKG_VERSION").to_string()
        } else {
            match &self.settings.version_manifest {
                Some(path) => read_manifest_version(path).await.unwrap_or_else(|e| {
                    warn!(
                        "Could not read version from {}: {}, using {}",
                        path.display(),
                        e,
                        FALLBACK_SYSTEM_VERSION
                    );
                    FALLBACK_SYSTEM_VERSION.to_string()
                }),
                None => env!("CARGO_PKG_VERSION").to_string(),
            }
        };

        self.state.set_system_version(version);
        Ok(())
    }
}

/// Path of a config file, honouring the dev-mode `.local` override
pub fn resolve_config_path(config_dir: &Path, name: &str, dev_mode: bool) -> PathBuf {
    if dev_mode {
        let local = Path::new(name)
            .file_stem()
            .map(|stem| config_dir.join(format!("{}.local.json", stem.to_string_lossy())));
        if let Some(local) = local.filter(|p| p.exists()) {
            return local;
        }
    }
    config_dir.join(name)
}

#[derive(Deserialize)]
struct VersionManifest {
    version: Option<String>,
}

async fn read_manifest_version(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path).await?;
    let manifest: VersionManifest = serde_json::from_str(&content)?;
    manifest
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::NotFound(format!("version field in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use initd_common::db::{init_database, insert_system_config_at};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        db: SqlitePool,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let db = init_database(&dir.path().join("initd.db")).await.unwrap();
            Self { dir, db }
        }

        fn write_config(&self, name: &str, value: serde_json::Value) {
            std::fs::write(self.dir.path().join(name), value.to_string()).unwrap();
        }

        fn initializer(&self, state: Arc<SystemState>, dev_mode: bool) -> SystemInitializer {
            SystemInitializer::new(
                state,
                self.db.clone(),
                InitSettings {
                    config_dir: self.dir.path().to_path_buf(),
                    version_manifest: None,
                    is_plus: false,
                    dev_mode,
                },
            )
        }
    }

    #[tokio::test]
    async fn test_init_from_file_only() {
        let fx = Fixture::new().await;
        fx.write_config(
            "config.json",
            json!({ "feConfigs": { "systemTitle": "File" }, "llmModels": [{ "model": "chat" }] }),
        );
        let state = Arc::new(SystemState::new());

        let outcome = fx.initializer(state.clone(), false).get_init_config().await.unwrap();

        assert_eq!(outcome, InitOutcome::Initialized);
        assert!(state.is_initd());
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "File");
        assert_eq!(state.fe_configs().unwrap()["isPlus"], false);
        assert_eq!(state.buffer_id(), None);
        assert_eq!(state.system_version(), env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_db_record_overrides_file_and_sets_buffer_id() {
        let fx = Fixture::new().await;
        fx.write_config(
            "config.json",
            json!({ "feConfigs": { "systemTitle": "File" }, "llmModels": [{ "model": "file-chat" }] }),
        );
        let db_value: SystemConfigFile = serde_json::from_value(json!({
            "feConfigs": { "systemTitle": "DB" },
            "llmModels": [{ "model": "db-chat" }]
        }))
        .unwrap();
        insert_system_config_at(&fx.db, SystemConfigType::Core, &db_value, 1_700_000_000_000)
            .await
            .unwrap();
        let state = Arc::new(SystemState::new());

        fx.initializer(state.clone(), false).get_init_config().await.unwrap();

        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "DB");
        assert_eq!(state.active_models()[0].model, "db-chat");
        assert_eq!(state.buffer_id().as_deref(), Some("1700000000000"));
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({ "feConfigs": { "systemTitle": "one" } }));
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);

        assert_eq!(init.get_init_config().await.unwrap(), InitOutcome::Initialized);

        fx.write_config("config.json", json!({ "feConfigs": { "systemTitle": "two" } }));
        assert_eq!(
            init.get_init_config().await.unwrap(),
            InitOutcome::AlreadyInitialized
        );
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "one");
    }

    #[tokio::test]
    async fn test_concurrent_calls_initialize_once() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({}));
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);

        let (a, b) = tokio::join!(init.get_init_config(), init.get_init_config());
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == InitOutcome::AlreadyInitialized);

        assert_eq!(
            outcomes,
            vec![InitOutcome::Initialized, InitOutcome::AlreadyInitialized]
        );
    }

    #[tokio::test]
    async fn test_failure_without_prior_config_is_fatal() {
        let fx = Fixture::new().await;
        let state = Arc::new(SystemState::new());

        let result = fx.initializer(state.clone(), false).get_init_config().await;

        assert!(matches!(result, Err(Error::InitFailed(_))), "got {:?}", result);
        assert!(!state.is_initd(), "guard must be released after failure");
    }

    #[tokio::test]
    async fn test_failure_with_prior_config_is_degraded() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({ "feConfigs": { "systemTitle": "kept" } }));
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);
        init.get_init_config().await.unwrap();

        state.reset_init();
        fx.write_config("config.json", json!("not an object"));

        assert_eq!(init.get_init_config().await.unwrap(), InitOutcome::Degraded);
        assert!(!state.is_initd());
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "kept");
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_db_record() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({}));
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);
        init.get_init_config().await.unwrap();
        assert_eq!(state.buffer_id(), None);

        let db_value: SystemConfigFile =
            serde_json::from_value(json!({ "feConfigs": { "systemTitle": "new" } })).unwrap();
        insert_system_config_at(&fx.db, SystemConfigType::Core, &db_value, 42)
            .await
            .unwrap();

        init.reload().await.unwrap();
        assert_eq!(state.buffer_id().as_deref(), Some("42"));
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "new");
    }

    #[tokio::test]
    async fn test_reload_after_file_change_moves_buffer_id() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({ "llmModels": [{ "model": "old" }] }));
        insert_system_config_at(&fx.db, SystemConfigType::Core, &SystemConfigFile::default(), 42)
            .await
            .unwrap();
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);
        init.get_init_config().await.unwrap();
        assert_eq!(state.buffer_id().as_deref(), Some("42"));

        fx.write_config("config.json", json!({ "llmModels": [{ "model": "new" }] }));
        init.reload().await.unwrap();

        assert_eq!(state.active_models()[0].model, "new");
        let token = state.buffer_id().unwrap();
        assert_ne!(token, "42", "clients holding the old token must refetch");

        // Reloading unchanged content keeps the token
        init.reload().await.unwrap();
        assert_eq!(state.buffer_id().unwrap(), token);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_state() {
        let fx = Fixture::new().await;
        fx.write_config(
            "config.json",
            json!({ "feConfigs": { "systemTitle": "kept" }, "llmModels": [{ "model": "chat" }] }),
        );
        insert_system_config_at(&fx.db, SystemConfigType::Core, &SystemConfigFile::default(), 7)
            .await
            .unwrap();
        let state = Arc::new(SystemState::new());
        let init = fx.initializer(state.clone(), false);
        init.get_init_config().await.unwrap();
        let before = state.snapshot().unwrap();

        fx.write_config("config.json", json!(["not", "an", "object"]));
        let result = init.reload().await;

        assert!(matches!(result, Err(Error::Config(_))), "got {:?}", result);
        let after = state.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after), "published snapshot must not change");
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "kept");
        assert_eq!(state.active_models()[0].model, "chat");
        assert_eq!(state.buffer_id().as_deref(), Some("7"));
        assert!(state.is_initd());
    }

    #[tokio::test]
    async fn test_dev_mode_prefers_local_config() {
        let fx = Fixture::new().await;
        fx.write_config("config.json", json!({ "feConfigs": { "systemTitle": "prod" } }));
        fx.write_config("config.local.json", json!({ "feConfigs": { "systemTitle": "local" } }));

        let state = Arc::new(SystemState::new());
        fx.initializer(state.clone(), true).get_init_config().await.unwrap();
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "local");

        let state = Arc::new(SystemState::new());
        fx.initializer(state.clone(), false).get_init_config().await.unwrap();
        assert_eq!(state.fe_configs().unwrap()["systemTitle"], "prod");
    }

    #[test]
    fn test_resolve_config_path_without_local_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_config_path(dir.path(), "config.json", true),
            dir.path().join("config.json")
        );
    }

    #[tokio::test]
    async fn test_version_from_manifest() {
        let fx = Fixture::new().await;
        let manifest = fx.dir.path().join("package.json");
        std::fs::write(&manifest, r#"{ "name": "app", "version": "4.9.0" }"#).unwrap();

        let state = Arc::new(SystemState::new());
        let mut init = fx.initializer(state.clone(), false);
        init.settings.version_manifest = Some(manifest);

        init.load_system_version().await.unwrap();
        assert_eq!(state.system_version(), "4.9.0");
    }

    #[tokio::test]
    async fn test_version_falls_back_when_manifest_unreadable() {
        let fx = Fixture::new().await;
        let state = Arc::new(SystemState::new());
        let mut init = fx.initializer(state.clone(), false);
        init.settings.version_manifest = Some(fx.dir.path().join("missing.json"));

        init.load_system_version().await.unwrap();
        assert_eq!(state.system_version(), "0.0.0");
        assert!(state.has_system_version());
    }

    #[tokio::test]
    async fn test_version_is_loaded_once() {
        let fx = Fixture::new().await;
        let state = Arc::new(SystemState::new());
        state.set_system_version("1.2.3");

        fx.initializer(state.clone(), false)
            .load_system_version()
            .await
            .unwrap();
        assert_eq!(state.system_version(), "1.2.3");
    }
}
