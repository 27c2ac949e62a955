//! Configuration loading and management.
//!
//! Resolution order: explicit path, `TASK_MANAGER_CONFIG_PATH`,
//! `./task-manager/config.yaml`, `~/.task-manager/config.yaml`, defaults.
//! `TASK_MANAGER_DB_PATH` and `TASK_MANAGER_DONE_STATUS` are applied on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "TASK_MANAGER_CONFIG_PATH";
pub const DB_PATH_ENV: &str = "TASK_MANAGER_DB_PATH";
pub const DONE_STATUS_ENV: &str = "TASK_MANAGER_DONE_STATUS";

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub statuses: StatusesConfig,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("task-manager/tasks.db")
}

fn default_busy_timeout() -> u32 {
    crate::db::DEFAULT_BUSY_TIMEOUT_MS
}

/// Well-known status names resolved at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusesConfig {
    /// Status applied by finish to a task and its direct children.
    #[serde(default = "default_done_status")]
    pub done: String,
}

impl Default for StatusesConfig {
    fn default() -> Self {
        Self {
            done: default_done_status(),
        }
    }
}

fn default_done_status() -> String {
    "done".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve configuration from an explicit path, the environment and the
    /// default locations, then apply environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None => match default_locations().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    debug!(path = %path.display(), "Using config file");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable source (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = var(DB_PATH_ENV) {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(done) = var(DONE_STATUS_ENV)
            && !done.trim().is_empty()
        {
            self.statuses.done = done;
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Project then user config locations.
fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("task-manager").join("config.yaml")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".task-manager").join("config.yaml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_sections_missing() {
        let config = Config::from_yaml("server:\n  busy_timeout_ms: 250\n").unwrap();
        assert_eq!(config.server.busy_timeout_ms, 250);
        assert_eq!(config.server.db_path, PathBuf::from("task-manager/tasks.db"));
        assert_eq!(config.statuses.done, "done");
    }

    #[test]
    fn empty_file_is_default() {
        let config = Config::from_yaml("   \n").unwrap();
        assert_eq!(config.statuses.done, "done");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::from_yaml(
            "server:\n  db_path: /var/lib/tasks.db\nstatuses:\n  done: finished\n",
        )
        .unwrap();
        let vars: HashMap<&str, &str> =
            HashMap::from([(DB_PATH_ENV, "/tmp/override.db"), (DONE_STATUS_ENV, "closed")]);

        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.db_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.statuses.done, "closed");
    }

    #[test]
    fn blank_done_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == DONE_STATUS_ENV).then(|| " ".to_string()));
        assert_eq!(config.statuses.done, "done");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "statuses:\n  done: complete\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.statuses.done, "complete");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }
}
