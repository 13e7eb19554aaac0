use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{FieldKind, FlowKind, ProfileId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile '{name}' has an invalid address '{address}': {reason}")]
    InvalidAddress {
        name: String,
        address: String,
        reason: String,
    },
    #[error("profile '{0}' is enabled but has no username")]
    MissingIdentity(String),
    #[error("profile '{0}' is enabled but has no password")]
    MissingSecret(String),
}

/// Explicit selectors that take precedence over the heuristic table.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectorOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
}

impl SelectorOverrides {
    pub fn get(&self, kind: FieldKind) -> Option<&str> {
        let slot = match kind {
            FieldKind::Username => &self.username,
            FieldKind::Password => &self.password,
            FieldKind::Submit => &self.submit,
        };
        slot.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, kind: FieldKind, selector: Option<String>) {
        let selector = selector.filter(|s| !s.trim().is_empty());
        match kind {
            FieldKind::Username => self.username = selector,
            FieldKind::Password => self.password = selector,
            FieldKind::Submit => self.submit = selector,
        }
    }

    pub fn is_empty(&self) -> bool {
        FieldKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }
}

/// A saved login target. Owned by the profile layer; the core only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProfile {
    #[serde(default)]
    pub id: ProfileId,
    pub name: String,
    #[serde(rename = "url")]
    pub address: String,
    #[serde(rename = "username")]
    pub identity: String,
    #[serde(rename = "password")]
    pub secret: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(rename = "loginType", default)]
    pub flow: FlowKind,
    #[serde(rename = "userSelector", default, skip_serializing_if = "Option::is_none")]
    pub username_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

fn enabled_default() -> bool {
    true
}

impl SiteProfile {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            id: ProfileId::new(),
            name: name.into(),
            address: address.into(),
            identity: identity.into(),
            secret: secret.into(),
            enabled: true,
            flow: FlowKind::SinglePage,
            username_selector: None,
            password_selector: None,
            submit_selector: None,
            notes: None,
            last_used: None,
            favicon: None,
        }
    }

    pub fn with_flow(mut self, flow: FlowKind) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_selector(mut self, kind: FieldKind, selector: impl Into<String>) -> Self {
        let selector = Some(selector.into());
        match kind {
            FieldKind::Username => self.username_selector = selector,
            FieldKind::Password => self.password_selector = selector,
            FieldKind::Submit => self.submit_selector = selector,
        }
        self
    }

    pub fn overrides(&self) -> SelectorOverrides {
        let mut overrides = SelectorOverrides::default();
        overrides.set(FieldKind::Username, self.username_selector.clone());
        overrides.set(FieldKind::Password, self.password_selector.clone());
        overrides.set(FieldKind::Submit, self.submit_selector.clone());
        overrides
    }

    /// Checks the address is absolute and, for enabled profiles, that both
    /// credentials are present.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let parsed = Url::parse(&self.address).map_err(|err| ProfileError::InvalidAddress {
            name: self.name.clone(),
            address: self.address.clone(),
            reason: err.to_string(),
        })?;
        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err(ProfileError::InvalidAddress {
                name: self.name.clone(),
                address: self.address.clone(),
                reason: "address must be absolute with a host".to_string(),
            });
        }
        if self.enabled {
            if self.identity.is_empty() {
                return Err(ProfileError::MissingIdentity(self.name.clone()));
            }
            if self.secret.is_empty() {
                return Err(ProfileError::MissingSecret(self.name.clone()));
            }
        }
        Ok(())
    }
}

/// Credential bundle carried through the transport channel.
///
/// Self-contained on purpose: a freshly loaded page can act on it without
/// looking up the profile it came from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub identity: String,
    pub secret: String,
    pub flow: FlowKind,
    #[serde(default)]
    pub overrides: SelectorOverrides,
}

impl SessionPayload {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>, flow: FlowKind) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
            flow,
            overrides: SelectorOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: SelectorOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn value_for(&self, kind: FieldKind) -> Option<&str> {
        match kind {
            FieldKind::Username => Some(&self.identity),
            FieldKind::Password => Some(&self.secret),
            FieldKind::Submit => None,
        }
    }
}

impl From<&SiteProfile> for SessionPayload {
    fn from(profile: &SiteProfile) -> Self {
        SessionPayload::new(&profile.identity, &profile.secret, profile.flow)
            .with_overrides(profile.overrides())
    }
}

impl fmt::Debug for SessionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPayload")
            .field("identity", &self.identity)
            .field("secret", &format_args!("<{} chars>", self.secret.chars().count()))
            .field("flow", &self.flow)
            .field("overrides", &self.overrides)
            .finish()
    }
}
