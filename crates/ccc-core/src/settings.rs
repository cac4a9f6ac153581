//! Settings boundary: string key/value persistence owned by the host, plus a typed
//! gateway over it. Only `apiBase` and `slackEnable` outlive a session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

pub const KEY_API_BASE: &str = "apiBase";
pub const KEY_SLACK_ENABLE: &str = "slackEnable";

/// Host persistence mechanism.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    async fn save(&self) -> Result<()>;
}

/// Process-local store; `save` is a no-op.
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: BTreeMap<String, String>,
}

impl MemorySettings {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }
}

/// JSON map of string values on disk.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSettings {
    /// Open `path`; a missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading settings {}", path.display()))
            }
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&self.values)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing settings {}", self.path.display()))?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_base: Option<String>,
    pub slack_enabled: bool,
}

/// Typed accessor over a [`SettingsStore`].
pub struct SettingsGateway {
    store: Mutex<Box<dyn SettingsStore>>,
}

impl SettingsGateway {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.lock().await.get(key)
    }

    pub async fn load(&self) -> Settings {
        let store = self.store.lock().await;
        Settings {
            api_base: store
                .get(KEY_API_BASE)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            slack_enabled: store
                .get(KEY_SLACK_ENABLE)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub async fn slack_enabled(&self) -> bool {
        self.load().await.slack_enabled
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let mut store = self.store.lock().await;
        // An empty apiBase reads back as "use the configured default".
        let base = settings.api_base.as_deref().map(str::trim).unwrap_or_default();
        store.set(KEY_API_BASE, base.to_string());
        store.set(
            KEY_SLACK_ENABLE,
            if settings.slack_enabled { "true" } else { "false" }.to_string(),
        );
        store.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gateway_reads_string_flags() {
        let gw = SettingsGateway::new(Box::new(
            MemorySettings::default()
                .with(KEY_API_BASE, " http://api.test ")
                .with(KEY_SLACK_ENABLE, "true"),
        ));
        let s = gw.load().await;
        assert_eq!(s.api_base.as_deref(), Some("http://api.test"));
        assert!(s.slack_enabled);
    }

    #[tokio::test]
    async fn missing_keys_default_off() {
        let gw = SettingsGateway::new(Box::new(MemorySettings::default()));
        let s = gw.load().await;
        assert_eq!(s.api_base, None);
        assert!(!s.slack_enabled);
    }

    #[tokio::test]
    async fn file_settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let gw = SettingsGateway::new(Box::new(FileSettings::open(&path).unwrap()));
        gw.save(&Settings {
            api_base: Some("http://saved.test".into()),
            slack_enabled: true,
        })
        .await
        .unwrap();

        let reopened = FileSettings::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_SLACK_ENABLE).as_deref(), Some("true"));
        assert_eq!(reopened.get(KEY_API_BASE).as_deref(), Some("http://saved.test"));
    }

    #[tokio::test]
    async fn saving_without_base_clears_the_stored_one() {
        let gw = SettingsGateway::new(Box::new(
            MemorySettings::default().with(KEY_API_BASE, "http://old.test:1"),
        ));
        gw.save(&Settings {
            api_base: None,
            slack_enabled: false,
        })
        .await
        .unwrap();
        assert_eq!(gw.get(KEY_API_BASE).await.as_deref(), Some(""));
        assert_eq!(gw.load().await.api_base, None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FileSettings::open(&path).is_err());
    }
}
