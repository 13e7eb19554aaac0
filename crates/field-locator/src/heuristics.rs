//! Declarative heuristic table

use std::fmt;

use autologin_core_types::FieldKind;
use autologin_page_model::ElementSnapshot;
use serde::{Deserialize, Serialize};

/// Typed test against one element.
///
/// Values compare ASCII case-insensitively; `tag` restricts the element type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Predicate {
    AttributeEquals {
        tag: String,
        attr: String,
        value: String,
    },
    AttributeContains {
        tag: String,
        attr: String,
        needle: String,
    },
    TextContains {
        tag: String,
        needle: String,
    },
}

impl Predicate {
    pub fn attr_equals(tag: &str, attr: &str, value: &str) -> Self {
        Predicate::AttributeEquals {
            tag: tag.to_string(),
            attr: attr.to_string(),
            value: value.to_string(),
        }
    }

    pub fn attr_contains(tag: &str, attr: &str, needle: &str) -> Self {
        Predicate::AttributeContains {
            tag: tag.to_string(),
            attr: attr.to_string(),
            needle: needle.to_string(),
        }
    }

    pub fn text_contains(tag: &str, needle: &str) -> Self {
        Predicate::TextContains {
            tag: tag.to_string(),
            needle: needle.to_string(),
        }
    }

    fn tag(&self) -> &str {
        match self {
            Predicate::AttributeEquals { tag, .. }
            | Predicate::AttributeContains { tag, .. }
            | Predicate::TextContains { tag, .. } => tag,
        }
    }

    pub fn matches(&self, element: &ElementSnapshot) -> bool {
        if !element.tag.eq_ignore_ascii_case(self.tag()) {
            return false;
        }
        match self {
            Predicate::AttributeEquals { attr, value, .. } => element
                .attr(attr)
                .map(|v| v.eq_ignore_ascii_case(value))
                .unwrap_or(false),
            Predicate::AttributeContains { attr, needle, .. } => element
                .attr(attr)
                .map(|v| contains_ignore_case(v, needle))
                .unwrap_or(false),
            Predicate::TextContains { needle, .. } => contains_ignore_case(&element.text, needle),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::AttributeEquals { tag, attr, value } => {
                write!(f, "{tag}[{attr}=\"{value}\"]")
            }
            Predicate::AttributeContains { tag, attr, needle } => {
                write!(f, "{tag}[{attr}*=\"{needle}\" i]")
            }
            Predicate::TextContains { tag, needle } => write!(f, "{tag}:contains(\"{needle}\")"),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty()
        && haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
}

/// Ordered predicates per field kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicTable {
    pub username: Vec<Predicate>,
    pub password: Vec<Predicate>,
    pub submit: Vec<Predicate>,
}

impl HeuristicTable {
    pub fn candidates(&self, kind: FieldKind) -> &[Predicate] {
        match kind {
            FieldKind::Username => &self.username,
            FieldKind::Password => &self.password,
            FieldKind::Submit => &self.submit,
        }
    }

    /// First predicate with a usable match decides; returns its rank and the
    /// first matching element in document order.
    pub fn evaluate<'a>(
        &self,
        kind: FieldKind,
        elements: &'a [ElementSnapshot],
    ) -> Option<(usize, &'a ElementSnapshot)> {
        self.candidates(kind)
            .iter()
            .enumerate()
            .find_map(|(rank, predicate)| {
                elements
                    .iter()
                    .find(|el| el.is_usable() && predicate.matches(el))
                    .map(|el| (rank, el))
            })
    }
}

impl Default for HeuristicTable {
    fn default() -> Self {
        let mut username = vec![
            Predicate::attr_equals("input", "type", "text"),
            Predicate::attr_equals("input", "type", "email"),
        ];
        for attr in ["name", "id"] {
            for needle in ["user", "login", "email"] {
                username.push(Predicate::attr_contains("input", attr, needle));
            }
        }

        let password = vec![
            Predicate::attr_equals("input", "type", "password"),
            Predicate::attr_contains("input", "name", "pass"),
            Predicate::attr_contains("input", "id", "pass"),
        ];

        let mut submit = vec![
            Predicate::attr_equals("button", "type", "submit"),
            Predicate::attr_equals("input", "type", "submit"),
        ];
        for attr in ["class", "id"] {
            for needle in ["login", "submit"] {
                submit.push(Predicate::attr_contains("button", attr, needle));
            }
        }
        for label in ["Entrar", "Login", "Sign"] {
            submit.push(Predicate::text_contains("button", label));
        }

        Self {
            username,
            password,
            submit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autologin_page_model::ElementId;

    fn el(id: usize, tag: &str, attrs: &[(&str, &str)], text: &str) -> ElementSnapshot {
        ElementSnapshot {
            id: ElementId(id),
            parent: None,
            tag: tag.into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: text.into(),
            visible: true,
            enabled: true,
            rect: None,
        }
    }

    #[test]
    fn table_order_matches_priority() {
        let table = HeuristicTable::default();
        assert_eq!(table.username.len(), 8);
        assert_eq!(table.password.len(), 3);
        assert_eq!(table.submit.len(), 9);
        assert_eq!(table.username[0].to_string(), "input[type=\"text\"]");
        assert_eq!(table.submit[8].to_string(), "button:contains(\"Sign\")");
    }

    #[test]
    fn earlier_predicate_beats_earlier_element() {
        let table = HeuristicTable::default();
        let elements = vec![
            el(0, "input", &[("name", "user_email"), ("type", "tel")], ""),
            el(1, "input", &[("type", "email")], ""),
        ];
        let (rank, hit) = table.evaluate(FieldKind::Username, &elements).unwrap();
        assert_eq!(rank, 1);
        assert_eq!(hit.id, ElementId(1));
    }

    #[test]
    fn ties_resolve_to_document_order() {
        let table = HeuristicTable::default();
        let elements = vec![
            el(0, "input", &[("type", "password"), ("name", "old")], ""),
            el(1, "input", &[("type", "password"), ("name", "new")], ""),
        ];
        let (_, hit) = table.evaluate(FieldKind::Password, &elements).unwrap();
        assert_eq!(hit.id, ElementId(0));
    }

    #[test]
    fn unusable_elements_are_skipped() {
        let table = HeuristicTable::default();
        let mut hidden = el(0, "input", &[("type", "password")], "");
        hidden.visible = false;
        let elements = vec![hidden, el(1, "input", &[("id", "PassWord")], "")];
        let (rank, hit) = table.evaluate(FieldKind::Password, &elements).unwrap();
        assert_eq!((rank, hit.id), (2, ElementId(1)));
    }

    #[test]
    fn text_labels_match_case_insensitively() {
        let table = HeuristicTable::default();
        let elements = vec![el(0, "button", &[], "SIGN IN")];
        assert!(table.evaluate(FieldKind::Submit, &elements).is_some());
        assert!(table.evaluate(FieldKind::Username, &elements).is_none());
    }

    #[test]
    fn predicates_serialize_as_tagged_variants() {
        let raw = serde_json::to_value(Predicate::text_contains("button", "Login")).unwrap();
        assert_eq!(raw["kind"], "text-contains");
        assert_eq!(raw["needle"], "Login");
    }
}
