use crate::error::{GraphspaceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File under the data directory holding the shared engine settings.
pub const CONFIG_FILE: &str = "graphspace.json";

/// Settings shared by every workspace's knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Name of the graph file inside each workspace directory.
    pub graph_file: String,
    /// Persist after every mutation instead of only on finalize.
    pub flush_on_write: bool,
    /// Upper bound on chunks + entities + relationships per custom KG insert.
    pub max_batch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            graph_file: "graph.json".to_string(),
            flush_on_write: true,
            max_batch_size: 10_000,
        }
    }
}

impl GraphConfig {
    /// Read `{data_dir}/graphspace.json`.
    ///
    /// Returns `Ok(None)` when the file does not exist and
    /// [`GraphspaceError::Config`] when it cannot be read or parsed.
    /// Environment overrides are not applied.
    pub fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            GraphspaceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str::<GraphConfig>(&content).map_err(|e| {
            GraphspaceError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(config))
    }

    /// Load settings from `{data_dir}/graphspace.json`, falling back to
    /// defaults, then apply `GRAPHSPACE_FLUSH_ON_WRITE` and
    /// `GRAPHSPACE_MAX_BATCH_SIZE` overrides.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let mut config = match Self::load(data_dir) {
            Ok(Some(config)) => {
                tracing::info!(
                    "Loaded graph config: graph_file={}, flush_on_write={}",
                    config.graph_file,
                    config.flush_on_write
                );
                config
            }
            Ok(None) => {
                tracing::info!("No {} found, using default graph config", CONFIG_FILE);
                GraphConfig::default()
            }
            Err(e) => {
                tracing::error!("{}, using defaults", e);
                GraphConfig::default()
            }
        };

        if let Ok(v) = std::env::var("GRAPHSPACE_FLUSH_ON_WRITE") {
            match v.trim() {
                "1" | "true" => config.flush_on_write = true,
                "0" | "false" => config.flush_on_write = false,
                other => tracing::warn!("Ignoring GRAPHSPACE_FLUSH_ON_WRITE={:?}", other),
            }
        }
        if let Ok(v) = std::env::var("GRAPHSPACE_MAX_BATCH_SIZE") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_batch_size = n,
                _ => tracing::warn!("Ignoring GRAPHSPACE_MAX_BATCH_SIZE={:?}", v),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests that touch process env vars share global state; serialize them.
    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn clear_env() {
        std::env::remove_var("GRAPHSPACE_FLUSH_ON_WRITE");
        std::env::remove_var("GRAPHSPACE_MAX_BATCH_SIZE");
    }

    #[test]
    fn no_file_gives_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let tmp = tempfile::tempdir().unwrap();

        assert_eq!(GraphConfig::load_or_default(tmp.path()), GraphConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"{"graph_file": "kg.json"}"#,
        )
        .unwrap();

        let config = GraphConfig::load_or_default(tmp.path());
        assert_eq!(config.graph_file, "kg.json");
        assert!(config.flush_on_write);
        assert_eq!(config.max_batch_size, 10_000);
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "not json").unwrap();

        assert_eq!(GraphConfig::load_or_default(tmp.path()), GraphConfig::default());
    }

    #[test]
    fn strict_load_reports_config_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(GraphConfig::load(tmp.path()).unwrap(), None);

        std::fs::write(tmp.path().join(CONFIG_FILE), "not json").unwrap();
        let err = GraphConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, GraphspaceError::Config(ref msg) if msg.contains(CONFIG_FILE)));
        assert_eq!(err.status_code(), 500);

        std::fs::write(tmp.path().join(CONFIG_FILE), r#"{"max_batch_size": 7}"#).unwrap();
        let config = GraphConfig::load(tmp.path()).unwrap().unwrap();
        assert_eq!(config.max_batch_size, 7);
    }

    #[test]
    fn env_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"{"flush_on_write": true, "max_batch_size": 5}"#,
        )
        .unwrap();

        std::env::set_var("GRAPHSPACE_FLUSH_ON_WRITE", "false");
        std::env::set_var("GRAPHSPACE_MAX_BATCH_SIZE", "42");
        let config = GraphConfig::load_or_default(tmp.path());
        clear_env();

        assert!(!config.flush_on_write);
        assert_eq!(config.max_batch_size, 42);
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();

        std::env::set_var("GRAPHSPACE_FLUSH_ON_WRITE", "maybe");
        std::env::set_var("GRAPHSPACE_MAX_BATCH_SIZE", "0");
        let config = GraphConfig::load_or_default(tmp.path());
        clear_env();

        assert_eq!(config, GraphConfig::default());
    }
}
