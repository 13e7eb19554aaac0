//! Transport channel for session payloads
//!
//! The payload rides in the fragment of the page address: it survives a full
//! reload, stays on the client (fragments are never sent in requests) and each
//! field is percent-encoded on its own so delimiter characters inside values
//! survive the trip.

use autologin_core_types::{AutofillError, FlowKind, SelectorOverrides, SessionPayload};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use tracing::debug;

pub const KEY_IDENTITY: &str = "autologin_user";
pub const KEY_SECRET: &str = "autologin_pass";
pub const KEY_FLOW: &str = "autologin_type";
pub const KEY_USERNAME_SELECTOR: &str = "autologin_usersel";
pub const KEY_PASSWORD_SELECTOR: &str = "autologin_passsel";
pub const KEY_SUBMIT_SELECTOR: &str = "autologin_submitsel";

/// Everything except the characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no session in channel")]
    Absent,
    #[error("field '{key}' is not valid percent-encoded UTF-8")]
    Malformed { key: String },
    #[error("unknown flow kind '{0}'")]
    UnknownFlow(String),
}

impl From<TransportError> for AutofillError {
    fn from(err: TransportError) -> Self {
        AutofillError::TransportDecodeFailure(err.to_string())
    }
}

/// Encodes `payload` as a fragment (without the leading `#`).
pub fn encode(payload: &SessionPayload) -> String {
    let overrides = &payload.overrides;
    let fields = [
        (KEY_IDENTITY, payload.identity.as_str()),
        (KEY_SECRET, payload.secret.as_str()),
        (KEY_FLOW, payload.flow.as_wire()),
        (
            KEY_USERNAME_SELECTOR,
            overrides.username.as_deref().unwrap_or(""),
        ),
        (
            KEY_PASSWORD_SELECTOR,
            overrides.password.as_deref().unwrap_or(""),
        ),
        (KEY_SUBMIT_SELECTOR, overrides.submit.as_deref().unwrap_or("")),
    ];
    fields
        .iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, COMPONENT)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes a fragment; any problem means "no active session".
pub fn decode(fragment: &str) -> Option<SessionPayload> {
    match try_decode(fragment) {
        Ok(payload) => Some(payload),
        Err(TransportError::Absent) => None,
        Err(err) => {
            debug!(error = %err, "ignoring unreadable transport channel");
            None
        }
    }
}

pub fn try_decode(fragment: &str) -> Result<SessionPayload, TransportError> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let pairs = parse_pairs(fragment)?;
    let lookup = |key: &str| find_value(&pairs, key);

    let identity = lookup(KEY_IDENTITY).ok_or(TransportError::Absent)?;
    let secret = lookup(KEY_SECRET).unwrap_or("");
    let flow = match lookup(KEY_FLOW) {
        None | Some("") => FlowKind::SinglePage,
        Some(raw) => {
            FlowKind::from_wire(raw).ok_or_else(|| TransportError::UnknownFlow(raw.to_string()))?
        }
    };
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(str::to_string);
    let overrides = SelectorOverrides {
        username: non_empty(KEY_USERNAME_SELECTOR),
        password: non_empty(KEY_PASSWORD_SELECTOR),
        submit: non_empty(KEY_SUBMIT_SELECTOR),
    };
    Ok(SessionPayload::new(identity, secret, flow).with_overrides(overrides))
}

fn find_value<'a>(pairs: &'a [(&str, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.as_str())
}

/// Splits `k=v&k=v` and percent-decodes both sides; first occurrence of a key wins.
fn parse_pairs(fragment: &str) -> Result<Vec<(&str, String)>, TransportError> {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    for segment in fragment.split('&').filter(|s| !s.is_empty()) {
        let (key, raw) = segment.split_once('=').unwrap_or((segment, ""));
        if pairs.iter().any(|(k, _)| *k == key) {
            continue;
        }
        if !key.starts_with("autologin_") {
            continue;
        }
        let value = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| TransportError::Malformed {
                key: key.to_string(),
            })?;
        pairs.push((key, value.into_owned()));
    }
    Ok(pairs)
}

/// Fragment of `address`, without the `#`.
pub fn fragment_of(address: &str) -> Option<&str> {
    address.split_once('#').map(|(_, fragment)| fragment)
}

pub fn decode_address(address: &str) -> Option<SessionPayload> {
    fragment_of(address).and_then(decode)
}

/// Replaces any fragment of `address` with the encoded payload.
pub fn attach(address: &str, payload: &SessionPayload) -> String {
    let base = address.split_once('#').map(|(b, _)| b).unwrap_or(address);
    format!("{base}#{}", encode(payload))
}

/// Launch address for a profile address, validated as an absolute URL.
pub fn launch_address(address: &str, payload: &SessionPayload) -> Result<String, url::ParseError> {
    let mut parsed = url::Url::parse(address)?;
    parsed.set_fragment(None);
    Ok(attach(parsed.as_str(), payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(secret: &str) -> SessionPayload {
        SessionPayload::new("jane.doe@example.com", secret, FlowKind::MultiPage).with_overrides(
            SelectorOverrides {
                username: Some("input[name=\"login\"]".into()),
                password: None,
                submit: Some("#btn-entrar".into()),
            },
        )
    }

    #[test]
    fn delimiter_characters_survive() {
        for secret in ["a&b=c#d", "100% + more", "ä ö ü ✓", "&&==##", ""] {
            let p = payload(secret);
            assert_eq!(decode(&encode(&p)), Some(p));
        }
    }

    #[test]
    fn encoded_values_never_contain_structural_delimiters() {
        let encoded = encode(&payload("x&y=z#w"));
        assert_eq!(encoded.matches('&').count(), 5);
        assert!(!encoded.contains('#'));
        assert!(encoded.contains("autologin_type=multi-page"));
    }

    #[test]
    fn absent_or_malformed_channels_decode_to_none() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("section-2"), None);
        assert_eq!(decode("autologin_pass=x"), None);
        assert_eq!(decode("autologin_user=%E0%A4%A"), None);
        assert_eq!(decode("autologin_user=a&autologin_type=sideways"), None);
    }

    #[test]
    fn missing_flow_defaults_to_single_page() {
        let decoded = decode("#autologin_user=bob&autologin_pass=pw").unwrap();
        assert_eq!(decoded.flow, FlowKind::SinglePage);
        assert!(decoded.overrides.is_empty());
    }

    #[test]
    fn attach_replaces_previous_fragment() {
        let p = payload("pw");
        let first = attach("https://example.com/login#stale", &p);
        assert!(first.starts_with("https://example.com/login#autologin_user="));
        assert_eq!(attach(&first, &p), first);
        assert_eq!(decode_address(&first), Some(p));
    }

    #[test]
    fn launch_address_requires_absolute_url() {
        let p = payload("pw");
        assert!(launch_address("not a url", &p).is_err());
        let addr = launch_address("https://example.com/sign-in?next=%2F", &p).unwrap();
        assert!(addr.starts_with("https://example.com/sign-in?next=%2F#"));
    }
}
