//! Element snapshots and synthetic events

use std::fmt;

use autologin_core_types::ElementDescriptor;
use serde::{Deserialize, Serialize};

/// Stable handle of an element within one document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box in viewport coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Read-only view of an element at the time it was queried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub parent: Option<ElementId>,
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in source order; names are lowercase
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub rect: Option<Rect>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|raw| raw.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Visible and enabled
    pub fn is_usable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Inputs and buttons are the only capture targets
    pub fn is_interactive(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "button")
    }

    pub fn descriptor(&self) -> ElementDescriptor {
        let non_empty = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);
        let classes: Vec<String> = self.classes().into_iter().map(str::to_string).collect();
        ElementDescriptor {
            tag: self.tag.clone(),
            input_type: non_empty(self.attr("type")),
            id: non_empty(self.attr("id")),
            name: non_empty(self.attr("name")),
            classes: if classes.is_empty() {
                None
            } else {
                Some(classes)
            },
        }
    }
}

/// Synthetic events the core dispatches on elements.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DomEvent {
    Focus,
    Input,
    KeyDown { key: String },
    KeyUp { key: String },
    Change,
    Blur,
    Click,
}

impl DomEvent {
    pub fn key_up(key: impl Into<String>) -> Self {
        DomEvent::KeyUp { key: key.into() }
    }

    pub fn enter() -> Self {
        DomEvent::KeyDown {
            key: "Enter".to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Focus => "focus",
            DomEvent::Input => "input",
            DomEvent::KeyDown { .. } => "keydown",
            DomEvent::KeyUp { .. } => "keyup",
            DomEvent::Change => "change",
            DomEvent::Blur => "blur",
            DomEvent::Click => "click",
        }
    }
}
