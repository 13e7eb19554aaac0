use autologin_core_types::ProfileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("profile '{0}' is disabled")]
    ProfileDisabled(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("launch address rejected: {0}")]
    Address(#[from] url::ParseError),

    #[error("bundle serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
