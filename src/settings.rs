use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::{AppConfig, PersistedAppConfig};

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedAppConfig>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config directory {}", parent.display()))?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                match serde_json::from_slice::<PersistedAppConfig>(&bytes) {
                    Ok(config) => config.normalized(),
                    Err(e) => {
                        warn!("config {} is not valid JSON ({}), using defaults", path.display(), e);
                        PersistedAppConfig::default()
                    }
                }
            }
            _ => {
                let default = PersistedAppConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("failed to write default config {}", path.display()))?;
                info!("wrote default config to {}", path.display());
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
        })
    }

    pub async fn get(&self) -> PersistedAppConfig {
        self.data.read().await.clone()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn update(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let mut config = self.data.write().await;

        let mut next = config.clone();
        next.apply(update);
        let next = next.normalized();

        self.save(&next).await?;
        *config = next;
        Ok(config.clone())
    }

    async fn save(&self, config: &PersistedAppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write config {}", self.path.display()))?;
        Ok(())
    }
}
