//! Selector matching over element snapshots
//!
//! Overrides are plain CSS selectors, parsed and matched by `scraper` the
//! way a browser's `querySelectorAll` would. Snapshots are rendered back into
//! markup for matching; every rendered element carries its position in the
//! snapshot slice so matches map back without relying on attribute values.

use std::collections::HashMap;
use std::fmt;

use scraper::Html;

use crate::errors::SelectorError;
use crate::model::{ElementId, ElementSnapshot};

/// Attribute holding the snapshot position of each rendered element
const POSITION_ATTR: &str = "data-autologin-position";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Parsed selector list
#[derive(Clone)]
pub struct Selector {
    source: String,
    compiled: scraper::Selector,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let compiled = scraper::Selector::parse(trimmed)
            .map_err(|err| SelectorError::Invalid(err.to_string()))?;
        Ok(Self {
            source: trimmed.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Elements of `elements` matching this selector, in the order given.
    pub fn filter(&self, elements: &[ElementSnapshot]) -> Vec<ElementSnapshot> {
        if elements.is_empty() {
            return Vec::new();
        }
        let document = Html::parse_fragment(&render_markup(elements));
        let mut hits = vec![false; elements.len()];
        for matched in document.select(&self.compiled) {
            let position = matched
                .value()
                .attr(POSITION_ATTR)
                .and_then(|raw| raw.parse::<usize>().ok());
            if let Some(hit) = position.and_then(|pos| hits.get_mut(pos)) {
                *hit = true;
            }
        }
        elements
            .iter()
            .zip(hits)
            .filter(|(_, hit)| *hit)
            .map(|(element, _)| element.clone())
            .collect()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

/// Rebuilds the element tree as markup.
///
/// A parent link only counts when it names an element earlier in the slice;
/// anything else (self links, cycles, detached parents) makes the element a
/// root, so the tree is always finite.
fn render_markup(elements: &[ElementSnapshot]) -> String {
    let position: HashMap<ElementId, usize> = elements
        .iter()
        .enumerate()
        .map(|(pos, element)| (element.id, pos))
        .collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); elements.len()];
    let mut roots = Vec::new();
    for (pos, element) in elements.iter().enumerate() {
        let parent = element
            .parent
            .and_then(|id| position.get(&id).copied())
            .filter(|&parent| parent < pos);
        match parent {
            Some(parent) => children[parent].push(pos),
            None => roots.push(pos),
        }
    }

    enum Step {
        Open(usize),
        Close(usize),
    }
    let mut markup = String::new();
    let mut stack: Vec<Step> = roots.into_iter().rev().map(Step::Open).collect();
    while let Some(step) = stack.pop() {
        match step {
            Step::Open(pos) => {
                open_tag(&mut markup, pos, &elements[pos]);
                stack.push(Step::Close(pos));
                stack.extend(children[pos].iter().rev().map(|&child| Step::Open(child)));
            }
            Step::Close(pos) => {
                let tag = markup_tag(&elements[pos]);
                if !VOID_TAGS.contains(&tag) {
                    markup.push_str("</");
                    markup.push_str(tag);
                    markup.push('>');
                }
            }
        }
    }
    markup
}

fn open_tag(markup: &mut String, pos: usize, element: &ElementSnapshot) {
    let tag = markup_tag(element);
    markup.push('<');
    markup.push_str(tag);
    markup.push(' ');
    markup.push_str(POSITION_ATTR);
    markup.push_str("=\"");
    markup.push_str(&pos.to_string());
    markup.push('"');
    for (name, value) in &element.attributes {
        if !is_markup_name(name) || name.eq_ignore_ascii_case(POSITION_ATTR) {
            continue;
        }
        markup.push(' ');
        markup.push_str(name);
        markup.push_str("=\"");
        push_escaped(markup, value);
        markup.push('"');
    }
    markup.push('>');
    if !VOID_TAGS.contains(&tag) {
        push_escaped(markup, &element.text);
    }
}

/// Unrenderable tag names become a neutral container
fn markup_tag(element: &ElementSnapshot) -> &str {
    if is_markup_name(&element.tag) {
        element.tag.as_str()
    } else {
        "span"
    }
}

fn is_markup_name(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == ':')
}

fn push_escaped(markup: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '&' => markup.push_str("&amp;"),
            '<' => markup.push_str("&lt;"),
            '>' => markup.push_str("&gt;"),
            '"' => markup.push_str("&quot;"),
            _ => markup.push(ch),
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '-' || !ch.is_ascii()
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-' || !ch.is_ascii()
}

/// True when `raw` can be written after `#` or `.` without escaping.
pub fn is_plain_ident(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) && !first.is_ascii_digit() => {}
        _ => return false,
    }
    if raw.starts_with("--") || (raw.starts_with('-') && raw[1..].starts_with(|c: char| c.is_ascii_digit())) {
        return false;
    }
    chars.all(is_ident_char)
}

/// Quote `raw` for use inside `[attr="..."]`.
pub fn quote_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: usize, parent: Option<usize>, tag: &str, attrs: &[(&str, &str)], text: &str) -> ElementSnapshot {
        ElementSnapshot {
            id: ElementId(id),
            parent: parent.map(ElementId),
            tag: tag.to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: text.to_string(),
            visible: true,
            enabled: true,
            rect: None,
        }
    }

    fn doc() -> Vec<ElementSnapshot> {
        vec![
            el(0, None, "form", &[("id", "login-form")], ""),
            el(1, Some(0), "input", &[("type", "text"), ("name", "username")], ""),
            el(2, Some(0), "input", &[("type", "password"), ("class", "field secret")], ""),
            el(3, Some(0), "button", &[("type", "submit"), ("id", "go")], "Sign in"),
            el(4, None, "input", &[("type", "text"), ("name", "search")], ""),
        ]
    }

    fn ids_in(elements: &[ElementSnapshot], selector: &str) -> Vec<usize> {
        Selector::parse(selector)
            .unwrap()
            .filter(elements)
            .iter()
            .map(|e| e.id.0)
            .collect()
    }

    fn ids(selector: &str) -> Vec<usize> {
        ids_in(&doc(), selector)
    }

    #[test]
    fn matches_simple_compounds() {
        assert_eq!(ids("input[type=\"text\"]"), vec![1, 4]);
        assert_eq!(ids("#go"), vec![3]);
        assert_eq!(ids(".field.secret"), vec![2]);
        assert_eq!(ids("input[name*='user']"), vec![1]);
        assert_eq!(ids("[class~=secret]"), vec![2]);
        assert_eq!(ids("input:not([name])"), vec![2]);
    }

    #[test]
    fn combinators_walk_ancestors() {
        assert_eq!(ids("form input[type=text]"), vec![1]);
        assert_eq!(ids("#login-form > button"), vec![3]);
        assert_eq!(ids("input + input"), vec![2]);
        assert_eq!(ids("form > form"), Vec::<usize>::new());
    }

    #[test]
    fn lists_keep_document_order() {
        assert_eq!(ids("button, input[type=password]"), vec![2, 3]);
    }

    #[test]
    fn markup_in_values_cannot_forge_structure() {
        let elements = vec![
            el(0, None, "div", &[("title", "\"><form id=\"x\">")], "</div><input id=\"y\">"),
            el(1, Some(0), "input", &[("id", "real")], ""),
        ];
        assert_eq!(ids_in(&elements, "#x, #y"), Vec::<usize>::new());
        assert_eq!(ids_in(&elements, "div > #real"), vec![1]);
    }

    #[test]
    fn cyclic_parent_links_terminate() {
        let elements = vec![
            el(0, Some(1), "form", &[("id", "outer")], ""),
            el(1, Some(0), "div", &[], ""),
            el(2, Some(2), "input", &[("type", "text")], ""),
            el(3, Some(3), "input", &[("type", "password")], ""),
        ];
        assert_eq!(ids_in(&elements, "#outer input"), Vec::<usize>::new());
        assert_eq!(ids_in(&elements, "#outer div"), vec![1]);
        assert_eq!(ids_in(&elements, "input"), vec![2, 3]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(Selector::parse("input[type=").is_err());
        assert!(Selector::parse("#").is_err());
        assert!(matches!(
            Selector::parse("button:contains(\"Sign\")"),
            Err(SelectorError::Invalid(_))
        ));
        assert!(Selector::parse("input,,button").is_err());
    }

    #[test]
    fn plain_ident_detection() {
        assert!(is_plain_ident("user-name"));
        assert!(!is_plain_ident("1abc"));
        assert!(!is_plain_ident("ctl00:main"));
        assert_eq!(quote_value("a\"b"), "\"a\\\"b\"");
    }
}
