use std::path::{Path, PathBuf};

use autologin_detector::DetectorConfig;
use autologin_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `profiles_path`.
pub const PROFILES_ENV: &str = "AUTOLOGIN_PROFILES";

/// Top-level configuration, read from YAML.
///
/// ```yaml
/// engine:
///   poll_interval_ms: 800
///   max_attempts: 20
/// detector:
///   timeout_ms: 30000
/// profiles_path: ~/.config/autologin/profiles.json
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub detector: DetectorConfig,
    pub profiles_path: Option<PathBuf>,
}

impl AppConfig {
    /// Profile file to use: the configured path (a leading `~` is the home
    /// directory), else `profiles.json` under the user config directory.
    pub fn resolved_profiles_path(&self) -> Option<PathBuf> {
        self.profiles_path.as_deref().map(expand_home).or_else(|| {
            dirs::config_dir().map(|mut dir| {
                dir.push("autologin");
                dir.push("profiles.json");
                dir
            })
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let raw = "engine:\n  max_attempts: 5\nprofiles_path: /tmp/sites.yaml\n";
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.engine.max_attempts, 5);
        assert_eq!(config.engine.poll_interval_ms, 800);
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(
            config.resolved_profiles_path(),
            Some(PathBuf::from("/tmp/sites.yaml"))
        );
    }

    #[test]
    fn leading_tilde_means_home_directory() {
        let config: AppConfig = serde_yaml::from_str("profiles_path: ~/autologin/sites.json\n").unwrap();
        let expected = dirs::home_dir()
            .map(|home| home.join("autologin").join("sites.json"))
            .unwrap_or_else(|| PathBuf::from("~/autologin/sites.json"));
        assert_eq!(config.resolved_profiles_path(), Some(expected));

        let literal: AppConfig = serde_yaml::from_str("profiles_path: ./~sites.json\n").unwrap();
        assert_eq!(
            literal.resolved_profiles_path(),
            Some(PathBuf::from("./~sites.json"))
        );
    }
}
