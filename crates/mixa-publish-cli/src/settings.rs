use std::path::{Path, PathBuf};

use anyhow::Context;
use mixa_publish_core::{SiteInfo, SyncConfig};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

/// Settings directory inside the vault. Hidden, so it is never published.
pub const SETTINGS_DIR: &str = ".mixa";
pub const SETTINGS_FILE: &str = "settings.json";

/// Per-vault publishing settings. Fields missing from the file take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub secret_token: String,
    pub site_folder: String,
    pub subdomain: String,
    pub publish_external: bool,
    pub site_url: String,
    pub site_edit_url: String,
}

impl Settings {
    pub fn path(vault: &Path) -> PathBuf {
        vault.join(SETTINGS_DIR).join(SETTINGS_FILE)
    }

    pub async fn load(vault: &Path) -> anyhow::Result<Self> {
        let path = Self::path(vault);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub async fn save(&self, vault: &Path) -> anyhow::Result<()> {
        let path = Self::path(vault);
        fs::create_dir_all(vault.join(SETTINGS_DIR))
            .await
            .with_context(|| format!("Failed to create {}", SETTINGS_DIR))?;
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&path, raw)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Record the site a token resolved to, or clear the site fields.
    pub fn link_site(&mut self, site: Option<&SiteInfo>) {
        self.subdomain = site.map(|s| s.subdomain.clone()).unwrap_or_default();
        self.site_url = site.map(|s| s.site_url.clone()).unwrap_or_default();
        self.site_edit_url = site.map(|s| s.site_edit_url.clone()).unwrap_or_default();
    }

    pub fn is_linked(&self) -> bool {
        !self.subdomain.trim().is_empty()
    }

    /// Site URL without its scheme, e.g. `notes.mixa.site`.
    pub fn site_host(&self) -> Option<&str> {
        if self.site_url.is_empty() {
            return None;
        }
        let host = self
            .site_url
            .split_once("//")
            .map_or(self.site_url.as_str(), |(_, rest)| rest);
        Some(host)
    }

    pub fn sync_config(&self, vault: &Path) -> SyncConfig {
        SyncConfig::new(vault, &self.site_folder, self.publish_external, &self.subdomain)
    }
}
