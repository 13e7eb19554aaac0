use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use super::output::OutputFormat;
use crate::config::AppConfig;
use crate::profiles::ProfileStore;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    profiles_override: Option<PathBuf>,
    output: OutputFormat,
    profiles: OnceCell<Arc<ProfileStore>>,
}

impl CliContext {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        profiles_override: Option<PathBuf>,
        output: OutputFormat,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            profiles_override,
            output,
            profiles: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn profiles_path(&self) -> Option<PathBuf> {
        self.profiles_override
            .clone()
            .or_else(|| self.config.resolved_profiles_path())
    }

    /// Profile store, loaded on first use.
    pub async fn profiles(&self) -> Result<Arc<ProfileStore>> {
        self.profiles
            .get_or_try_init(|| async {
                let path = self
                    .profiles_path()
                    .context("No profile file configured and no config directory available")?;
                Ok::<_, anyhow::Error>(Arc::new(ProfileStore::load(path).await?))
            })
            .await
            .map(Arc::clone)
    }
}
