use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, PROFILES_ENV};

/// Install the global subscriber. Console output goes to stderr so command
/// output on stdout stays machine-readable. The returned guard flushes the
/// log file and must live until exit.
pub fn init_logging(level: &str, debug: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().context("Log file path has no file name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => {
            // Priority: ./config/autologin.yaml > ~/.config/autologin/config.yaml
            let local_config = PathBuf::from("config/autologin.yaml");
            if local_config.exists() {
                local_config
            } else {
                let mut path = dirs::config_dir().context("Failed to get config directory")?;
                path.push("autologin");
                path.push("config.yaml");
                path
            }
        }
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let config: AppConfig =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded configuration from: {}", config_path.display());
        config
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        AppConfig::default()
    };

    apply_env_overrides(&mut config);
    config
        .engine
        .validate()
        .context("Invalid engine section in config")?;

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(path) = env::var(PROFILES_ENV) {
        if !path.trim().is_empty() {
            info!("Using profile file from {}: {}", PROFILES_ENV, path);
            config.profiles_path = Some(PathBuf::from(path));
        }
    }
}

/// Read a JSON or YAML document, picking the parser by extension.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
