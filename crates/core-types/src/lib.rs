use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod profile;

pub use profile::{ProfileError, SelectorOverrides, SessionPayload, SiteProfile};

/// Error taxonomy shared by the autofill core.
///
/// None of these halt the hosting page: recoverable variants keep the
/// orchestration polling, the rest resolve to a terminal state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutofillError {
    #[error("no element matched the {0} field")]
    SelectorNotFound(FieldKind),
    #[error("field element detached: {0}")]
    FieldDetached(String),
    #[error("gave up after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("transport channel unreadable: {0}")]
    TransportDecodeFailure(String),
    #[error("auxiliary context cannot be introspected: {0}")]
    CrossContextBlocked(String),
}

impl AutofillError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AutofillError::SelectorNotFound(_)
                | AutofillError::FieldDetached(_)
                | AutofillError::TransportDecodeFailure(_)
        )
    }
}

/// Semantic role of a form element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Username,
    Password,
    Submit,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Username, FieldKind::Password, FieldKind::Submit];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Username => "username",
            FieldKind::Password => "password",
            FieldKind::Submit => "submit",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "username" | "user" => Ok(FieldKind::Username),
            "password" | "pass" => Ok(FieldKind::Password),
            "submit" => Ok(FieldKind::Submit),
            other => Err(format!("unknown field kind '{other}'")),
        }
    }
}

/// Whether a login form asks for both credentials at once or over two pages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    #[default]
    #[serde(rename = "single")]
    SinglePage,
    #[serde(rename = "multi-page")]
    MultiPage,
}

impl FlowKind {
    /// Name used on the wire and in profile files.
    pub fn as_wire(&self) -> &'static str {
        match self {
            FlowKind::SinglePage => "single",
            FlowKind::MultiPage => "multi-page",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "single" | "single-page" => Some(FlowKind::SinglePage),
            "multi-page" => Some(FlowKind::MultiPage),
            _ => None,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of an element as reported by the field detector.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub field_kind: FieldKind,
    pub target: String,
}

impl DetectionRequest {
    pub fn new(field_kind: FieldKind, target: impl Into<String>) -> Self {
        Self {
            field_kind,
            target: target.into(),
        }
    }
}

/// Message posted back by the auxiliary context after a capture click.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub field_kind: FieldKind,
    pub selector: String,
    pub element_descriptor: ElementDescriptor,
}
