//! Selector derivation for a captured element
//!
//! Priority: `#id`, `[name="..."]`, `.class.list`, `tag[type="..."]`, `tag`.

use autologin_page_model::selector::{is_plain_ident, quote_value};
use autologin_page_model::ElementSnapshot;

pub fn derive_selector(element: &ElementSnapshot) -> String {
    if let Some(id) = element.attr("id").filter(|v| !v.is_empty()) {
        return if is_plain_ident(id) {
            format!("#{id}")
        } else {
            format!("[id={}]", quote_value(id))
        };
    }

    if let Some(name) = element.attr("name").filter(|v| !v.is_empty()) {
        return format!("[name={}]", quote_value(name));
    }

    let classes = element.classes();
    if !classes.is_empty() && classes.iter().all(|c| is_plain_ident(c)) {
        return classes.iter().map(|c| format!(".{c}")).collect();
    }

    match element.attr("type").filter(|v| !v.is_empty()) {
        Some(input_type) => format!("{}[type={}]", element.tag, quote_value(input_type)),
        None => element.tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autologin_page_model::{ElementId, Selector};

    fn el(tag: &str, attrs: &[(&str, &str)]) -> ElementSnapshot {
        ElementSnapshot {
            id: ElementId(0),
            parent: None,
            tag: tag.into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: String::new(),
            visible: true,
            enabled: true,
            rect: None,
        }
    }

    #[test]
    fn follows_priority_order() {
        let full = [("id", "login"), ("name", "user"), ("class", "a b"), ("type", "text")];
        assert_eq!(derive_selector(&el("input", &full)), "#login");
        assert_eq!(derive_selector(&el("input", &full[1..])), "[name=\"user\"]");
        assert_eq!(derive_selector(&el("input", &full[2..])), ".a.b");
        assert_eq!(derive_selector(&el("input", &full[3..])), "input[type=\"text\"]");
        assert_eq!(derive_selector(&el("button", &[])), "button");
    }

    #[test]
    fn awkward_ids_fall_back_to_attribute_form() {
        let sel = derive_selector(&el("input", &[("id", "ctl00$Main:user")]));
        assert_eq!(sel, "[id=\"ctl00$Main:user\"]");
        assert!(Selector::parse(&sel).is_ok());
    }

    #[test]
    fn empty_attributes_are_skipped() {
        let sel = derive_selector(&el("input", &[("id", ""), ("name", ""), ("type", "password")]));
        assert_eq!(sel, "input[type=\"password\"]");
    }

    #[test]
    fn derived_selectors_match_the_element() {
        let target = el("input", &[("name", "pa\"ss")]);
        let sel = Selector::parse(&derive_selector(&target)).unwrap();
        assert_eq!(sel.filter(std::slice::from_ref(&target)).len(), 1);
    }
}
