use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{BASE_DIR_ENV, DATA_DIR_NAME, DEFAULT_LIVE_WINDOW, DEFAULT_PAGE_SIZE};
use crate::models::TimeFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub page_size: usize,
    pub live_window: usize,
    pub stats_window: TimeFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_code: Option<String>,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
            live_window: DEFAULT_LIVE_WINDOW,
            stats_window: TimeFilter::default(),
            admin_code: None,
        }
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config.normalized())
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_live_window(mut self, live_window: usize) -> Self {
        self.live_window = live_window.max(1);
        self
    }

    /// Zero sizes would stall pagination; clamp them.
    fn normalized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.live_window = self.live_window.max(1);
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

/// `$MOODLOG_BASE_DIR` if set, otherwise the platform data dir.
pub fn default_data_dir() -> PathBuf {
    if let Ok(base_dir) = std::env::var(BASE_DIR_ENV) {
        return PathBuf::from(base_dir);
    }
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(DATA_DIR_NAME)
}
