//! In-memory document implementing `PagePort`

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::PageError;
use crate::model::{DomEvent, ElementId, ElementSnapshot, Rect};
use crate::port::PagePort;

/// Declarative description of one element, used by builders and fixtures.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub rect: Option<Rect>,
    /// Index of the parent element within the fixture
    #[serde(default)]
    pub parent: Option<usize>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type)
    }

    pub fn button(label: &str) -> Self {
        Self::new("button").text(label)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn name(self, name: &str) -> Self {
        self.attr("name", name)
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn disabled(self) -> Self {
        self.attr("disabled", "")
    }

    pub fn at(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn child_of(mut self, parent: ElementId) -> Self {
        self.parent = Some(parent.0);
        self
    }
}

/// Serialized page used by the CLI and integration tests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    pub address: String,
    #[serde(default = "ready_default")]
    pub ready: bool,
    /// Auxiliary contexts for this page refuse introspection
    #[serde(default)]
    pub cross_origin: bool,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

fn ready_default() -> bool {
    true
}

/// Event observed on an element, in dispatch order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub target: ElementId,
    pub event: DomEvent,
}

struct Node {
    spec: ElementSpec,
    value: String,
    attached: bool,
    outline: Option<String>,
}

struct PageState {
    address: String,
    ready: bool,
    cross_origin: bool,
    nodes: Vec<Node>,
    events: Vec<EventRecord>,
    active: Option<ElementId>,
    navigating: bool,
    /// Remaining dispatches before the page starts navigating
    navigate_after: Option<usize>,
}

/// In-memory document.
///
/// All state sits behind one mutex that is never held across an await.
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(PageState {
                address: address.into(),
                ready: true,
                cross_origin: false,
                nodes: Vec::new(),
                events: Vec::new(),
                active: None,
                navigating: false,
                navigate_after: None,
            }),
        }
    }

    /// Builds a page from a fixture.
    ///
    /// Every `parent` must name an element listed before the child, so the
    /// element tree cannot contain cycles.
    pub fn from_fixture(fixture: PageFixture) -> Result<Self, PageError> {
        for (index, spec) in fixture.elements.iter().enumerate() {
            match spec.parent {
                Some(parent) if parent >= index => {
                    return Err(PageError::InvalidFixture(format!(
                        "element {index} ({}) names parent {parent}, which does not precede it",
                        spec.tag
                    )));
                }
                _ => {}
            }
        }
        let page = Self::new(fixture.address);
        {
            let mut state = page.state.lock();
            state.ready = fixture.ready;
            state.cross_origin = fixture.cross_origin;
        }
        for spec in fixture.elements {
            page.add(spec);
        }
        Ok(page)
    }

    /// Appends an element. A parent that is not already on the page is dropped.
    pub fn add(&self, mut spec: ElementSpec) -> ElementId {
        let mut state = self.state.lock();
        let id = ElementId(state.nodes.len());
        if let Some(parent) = spec.parent.filter(|&parent| parent >= id.0) {
            warn!(element = id.0, parent, "ignoring parent that does not precede the element");
            spec.parent = None;
        }
        let value = spec.attrs.get("value").cloned().unwrap_or_default();
        state.nodes.push(Node {
            spec,
            value,
            attached: true,
            outline: None,
        });
        id
    }

    pub fn remove(&self, id: ElementId) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(id.0) {
            node.attached = false;
        }
    }

    /// Detaches every element, as a full navigation would.
    pub fn begin_navigation(&self) {
        let mut state = self.state.lock();
        Self::start_navigation(&mut state);
    }

    /// Starts navigating once `count` more events have been dispatched.
    pub fn navigate_after_events(&self, count: usize) {
        let mut state = self.state.lock();
        if count == 0 {
            Self::start_navigation(&mut state);
        } else {
            state.navigate_after = Some(count);
        }
    }

    fn start_navigation(state: &mut PageState) {
        debug!(address = %state.address, "memory page navigating");
        state.navigating = true;
        state.active = None;
        for node in state.nodes.iter_mut() {
            node.attached = false;
        }
    }

    pub fn is_navigating(&self) -> bool {
        self.state.lock().navigating
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn is_cross_origin(&self) -> bool {
        self.state.lock().cross_origin
    }

    pub fn set_cross_origin(&self, cross_origin: bool) {
        self.state.lock().cross_origin = cross_origin;
    }

    pub fn current_address(&self) -> String {
        self.state.lock().address.clone()
    }

    pub fn value_of(&self, id: ElementId) -> Option<String> {
        self.state.lock().nodes.get(id.0).map(|n| n.value.clone())
    }

    pub fn active_element(&self) -> Option<ElementId> {
        self.state.lock().active
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.state.lock().events.clone()
    }

    pub fn events_for(&self, id: ElementId) -> Vec<DomEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|rec| rec.target == id)
            .map(|rec| rec.event.clone())
            .collect()
    }

    pub fn set_outline(&self, id: ElementId, outline: Option<String>) {
        if let Some(node) = self.state.lock().nodes.get_mut(id.0) {
            node.outline = outline;
        }
    }

    pub fn outline_of(&self, id: ElementId) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(id.0)
            .and_then(|n| n.outline.clone())
    }

    /// Elements currently carrying an outline
    pub fn outlined(&self) -> Vec<ElementId> {
        self.state
            .lock()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.outline.is_some())
            .map(|(idx, _)| ElementId(idx))
            .collect()
    }

    /// Topmost attached, visible element whose box contains the point.
    pub fn element_at(&self, x: f64, y: f64) -> Option<ElementSnapshot> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .enumerate()
            .rev()
            .filter(|(idx, node)| node.attached && is_visible(&state.nodes, *idx))
            .find(|(_, node)| node.spec.rect.map(|r| r.contains(x, y)).unwrap_or(false))
            .map(|(idx, _)| snapshot(&state.nodes, idx))
    }

    pub fn snapshot(&self, id: ElementId) -> Option<ElementSnapshot> {
        let state = self.state.lock();
        state
            .nodes
            .get(id.0)
            .filter(|node| node.attached)
            .map(|_| snapshot(&state.nodes, id.0))
    }

    fn live_node<'a>(state: &'a mut PageState, id: ElementId) -> Result<&'a mut Node, PageError> {
        match state.nodes.get_mut(id.0) {
            Some(node) if node.attached => Ok(node),
            _ => Err(PageError::Detached(id)),
        }
    }
}

/// Hidden when the element or any ancestor is hidden.
///
/// Parents always precede their children, so the walk ends.
fn is_visible(nodes: &[Node], index: usize) -> bool {
    let spec = &nodes[index].spec;
    let hidden_input = spec.tag.eq_ignore_ascii_case("input")
        && spec
            .attrs
            .get("type")
            .map(|t| t.eq_ignore_ascii_case("hidden"))
            .unwrap_or(false);
    if hidden_input {
        return false;
    }
    let mut current = Some(index);
    while let Some(idx) = current {
        let spec = &nodes[idx].spec;
        if spec.hidden {
            return false;
        }
        current = spec.parent.filter(|&parent| parent < idx);
    }
    true
}

fn snapshot(nodes: &[Node], index: usize) -> ElementSnapshot {
    let node = &nodes[index];
    ElementSnapshot {
        id: ElementId(index),
        parent: node.spec.parent.map(ElementId),
        tag: node.spec.tag.to_ascii_lowercase(),
        attributes: node
            .spec
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        text: node.spec.text.clone(),
        visible: is_visible(nodes, index),
        enabled: !node.spec.attrs.contains_key("disabled"),
        rect: node.spec.rect,
    }
}

#[async_trait]
impl PagePort for MemoryPage {
    async fn address(&self) -> Result<String, PageError> {
        Ok(self.state.lock().address.clone())
    }

    async fn set_fragment(&self, fragment: &str) -> Result<(), PageError> {
        let mut state = self.state.lock();
        let base = match state.address.split_once('#') {
            Some((base, _)) => base.to_string(),
            None => state.address.clone(),
        };
        state.address = if fragment.is_empty() {
            base
        } else {
            format!("{base}#{fragment}")
        };
        Ok(())
    }

    async fn elements(&self) -> Result<Vec<ElementSnapshot>, PageError> {
        let state = self.state.lock();
        if state.navigating {
            return Ok(Vec::new());
        }
        Ok(state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.attached)
            .map(|(idx, _)| snapshot(&state.nodes, idx))
            .collect())
    }

    async fn is_attached(&self, id: ElementId) -> bool {
        let state = self.state.lock();
        state.nodes.get(id.0).map(|n| n.attached).unwrap_or(false)
    }

    async fn value(&self, id: ElementId) -> Result<String, PageError> {
        let mut state = self.state.lock();
        Ok(Self::live_node(&mut state, id)?.value.clone())
    }

    async fn set_value(&self, id: ElementId, value: &str) -> Result<(), PageError> {
        let mut state = self.state.lock();
        Self::live_node(&mut state, id)?.value = value.to_string();
        Ok(())
    }

    async fn dispatch(&self, id: ElementId, event: DomEvent) -> Result<(), PageError> {
        let mut state = self.state.lock();
        Self::live_node(&mut state, id)?;
        match &event {
            DomEvent::Focus => state.active = Some(id),
            DomEvent::Blur if state.active == Some(id) => state.active = None,
            _ => {}
        }
        state.events.push(EventRecord { target: id, event });
        if let Some(remaining) = state.navigate_after {
            if remaining <= 1 {
                state.navigate_after = None;
                Self::start_navigation(&mut state);
            } else {
                state.navigate_after = Some(remaining - 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_round_trip_through_json() {
        let raw = r#"{
            "address": "https://example.com/login",
            "elements": [
                { "tag": "form", "attrs": { "id": "f" } },
                { "tag": "input", "attrs": { "type": "password" }, "parent": 0, "rect": { "x": 0, "y": 0, "width": 100, "height": 20 } }
            ]
        }"#;
        let fixture: PageFixture = serde_json::from_str(raw).unwrap();
        let page = MemoryPage::from_fixture(fixture).unwrap();
        let matched = page.query_selector_all("#f input").await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, ElementId(1));
        assert!(page.is_ready());
    }

    #[tokio::test]
    async fn hidden_and_disabled_elements_are_flagged() {
        let page = MemoryPage::new("https://example.com");
        let hidden = page.add(ElementSpec::input("hidden").name("csrf"));
        let off = page.add(ElementSpec::input("text").disabled());
        let els = page.elements().await.unwrap();
        assert!(!els[hidden.0].visible);
        assert!(!els[off.0].enabled);
    }

    #[test]
    fn fixtures_with_forward_or_self_parents_are_rejected() {
        for parent in [1, 2] {
            let fixture = PageFixture {
                address: "https://example.com/login".into(),
                ready: true,
                cross_origin: false,
                elements: vec![
                    ElementSpec::new("form"),
                    ElementSpec {
                        parent: Some(parent),
                        ..ElementSpec::input("password")
                    },
                    ElementSpec::new("div").child_of(ElementId(1)),
                ],
            };
            assert!(matches!(
                MemoryPage::from_fixture(fixture),
                Err(PageError::InvalidFixture(_))
            ));
        }
    }

    #[tokio::test]
    async fn builder_drops_parents_that_do_not_precede() {
        let page = MemoryPage::new("https://example.com");
        let form = page.add(ElementSpec::new("form").id("f"));
        let looped = page.add(ElementSpec::input("text").child_of(ElementId(1)));
        let field = page.add(ElementSpec::input("password").child_of(form));
        let els = page.elements().await.unwrap();
        assert_eq!(els[looped.0].parent, None);
        assert_eq!(els[field.0].parent, Some(form));
        let matched = page.query_selector_all("#f input").await.unwrap();
        assert_eq!(matched.iter().map(|e| e.id).collect::<Vec<_>>(), vec![field]);
    }

    #[tokio::test]
    async fn hidden_ancestors_hide_descendants() {
        let page = MemoryPage::new("https://example.com");
        let wrapper = page.add(ElementSpec::new("div").hidden().at(0.0, 0.0, 300.0, 300.0));
        let form = page.add(ElementSpec::new("form").child_of(wrapper));
        let user = page.add(
            ElementSpec::input("text")
                .child_of(form)
                .at(10.0, 10.0, 100.0, 20.0),
        );
        let shown = page.add(ElementSpec::input("password").at(10.0, 400.0, 100.0, 20.0));
        let els = page.elements().await.unwrap();
        assert!(!els[form.0].visible);
        assert!(!els[user.0].visible);
        assert!(els[shown.0].visible);
        assert!(page.element_at(15.0, 15.0).is_none());
        assert_eq!(page.element_at(15.0, 405.0).map(|e| e.id), Some(shown));
    }

    #[tokio::test]
    async fn navigation_detaches_elements() {
        let page = MemoryPage::new("https://example.com");
        let field = page.add(ElementSpec::input("text"));
        page.navigate_after_events(2);
        page.dispatch(field, DomEvent::Focus).await.unwrap();
        page.dispatch(field, DomEvent::Input).await.unwrap();
        assert_eq!(
            page.dispatch(field, DomEvent::Input).await,
            Err(PageError::Detached(field))
        );
        assert!(page.elements().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_fragment_replaces_existing_fragment() {
        let page = MemoryPage::new("https://example.com/a#old");
        page.set_fragment("k=v").await.unwrap();
        assert_eq!(page.current_address(), "https://example.com/a#k=v");
        page.set_fragment("").await.unwrap();
        assert_eq!(page.current_address(), "https://example.com/a");
    }

    #[test]
    fn element_at_prefers_topmost() {
        let page = MemoryPage::new("https://example.com");
        page.add(ElementSpec::new("div").at(0.0, 0.0, 500.0, 500.0));
        let input = page.add(ElementSpec::input("text").at(10.0, 10.0, 100.0, 20.0));
        assert_eq!(page.element_at(15.0, 15.0).map(|e| e.id), Some(input));
        assert_eq!(page.element_at(400.0, 400.0).map(|e| e.tag), Some("div".into()));
        assert!(page.element_at(900.0, 900.0).is_none());
    }
}
