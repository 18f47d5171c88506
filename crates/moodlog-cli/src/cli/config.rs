use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use moodlog_core::CoreConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Where the local store lives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// User the commands act as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Code granting the admin role at sign up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_window: Option<usize>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `~/.config/moodlog/config.json` on Linux, the platform equivalent elsewhere
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("moodlog").join("config.json"))
    }

    /// The explicit file if given, else the default file if it exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Core configuration with these settings applied over the defaults
    pub fn to_core_config(&self) -> CoreConfig {
        let mut config = match &self.data_dir {
            Some(dir) => CoreConfig::new(dir),
            None => CoreConfig::default(),
        };
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(live_window) = self.live_window {
            config = config.with_live_window(live_window);
        }
        config.admin_code = self.admin_code.clone();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full() {
        let json = r#"{
            "dataDir": "/tmp/moodlog-cli",
            "userId": "alice",
            "adminCode": "letmein",
            "pageSize": 5
        }"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/moodlog-cli")));
        assert_eq!(config.user_id.as_deref(), Some("alice"));
        assert_eq!(config.page_size, Some(5));
        assert!(config.live_window.is_none());

        let core = config.to_core_config();
        assert_eq!(core.data_dir, PathBuf::from("/tmp/moodlog-cli"));
        assert_eq!(core.page_size, 5);
        assert_eq!(core.admin_code.as_deref(), Some("letmein"));
    }

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CliConfig::default());
        let core = config.to_core_config();
        assert_eq!(core.page_size, moodlog_core::constants::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"userId": "bob", "liveWindow": 0}"#).unwrap();

        let config = CliConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("bob"));
        assert_eq!(config.to_core_config().live_window, 1);
        assert!(CliConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
