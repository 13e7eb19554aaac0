//! Field resolver

use async_trait::async_trait;
use autologin_core_types::{FieldKind, SelectorOverrides};
use autologin_page_model::{ElementSnapshot, PagePort};
use tracing::{debug, warn};

use crate::heuristics::HeuristicTable;

/// Where a resolved element came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionSource {
    Explicit,
    Heuristic { rank: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub kind: FieldKind,
    pub element: ElementSnapshot,
    pub source: ResolutionSource,
}

/// Result of resolving all three field kinds against one document state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSet {
    pub username: Option<Resolution>,
    pub password: Option<Resolution>,
    pub submit: Option<Resolution>,
}

impl FieldSet {
    pub fn get(&self, kind: FieldKind) -> Option<&Resolution> {
        match kind {
            FieldKind::Username => self.username.as_ref(),
            FieldKind::Password => self.password.as_ref(),
            FieldKind::Submit => self.submit.as_ref(),
        }
    }

    pub fn missing(&self) -> Vec<FieldKind> {
        FieldKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }
}

/// Resolver trait
#[async_trait]
pub trait FieldResolver: Send + Sync {
    /// Resolve one field; `None` when nothing usable matches. Never fails.
    async fn resolve(
        &self,
        page: &dyn PagePort,
        kind: FieldKind,
        explicit: Option<&str>,
    ) -> Option<Resolution>;

    async fn resolve_all(&self, page: &dyn PagePort, overrides: &SelectorOverrides) -> FieldSet {
        FieldSet {
            username: self
                .resolve(page, FieldKind::Username, overrides.get(FieldKind::Username))
                .await,
            password: self
                .resolve(page, FieldKind::Password, overrides.get(FieldKind::Password))
                .await,
            submit: self
                .resolve(page, FieldKind::Submit, overrides.get(FieldKind::Submit))
                .await,
        }
    }
}

/// Default resolver: explicit selector, then the heuristic table.
#[derive(Clone, Debug, Default)]
pub struct HeuristicResolver {
    table: HeuristicTable,
}

impl HeuristicResolver {
    pub fn new(table: HeuristicTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &HeuristicTable {
        &self.table
    }

    /// Heuristic pass over an already captured element list.
    pub fn resolve_in(&self, kind: FieldKind, elements: &[ElementSnapshot]) -> Option<Resolution> {
        self.table
            .evaluate(kind, elements)
            .map(|(rank, element)| Resolution {
                kind,
                element: element.clone(),
                source: ResolutionSource::Heuristic { rank },
            })
    }

    async fn resolve_explicit(
        &self,
        page: &dyn PagePort,
        kind: FieldKind,
        selector: &str,
    ) -> Option<Resolution> {
        match page.query_selector_all(selector).await {
            Ok(matches) => matches
                .into_iter()
                .find(ElementSnapshot::is_usable)
                .map(|element| Resolution {
                    kind,
                    element,
                    source: ResolutionSource::Explicit,
                }),
            Err(err) => {
                warn!(field = %kind, selector, error = %err, "explicit selector unusable");
                None
            }
        }
    }
}

#[async_trait]
impl FieldResolver for HeuristicResolver {
    async fn resolve(
        &self,
        page: &dyn PagePort,
        kind: FieldKind,
        explicit: Option<&str>,
    ) -> Option<Resolution> {
        if let Some(selector) = explicit.filter(|s| !s.trim().is_empty()) {
            if let Some(hit) = self.resolve_explicit(page, kind, selector).await {
                debug!(field = %kind, selector, element = %hit.element.id, "resolved by override");
                return Some(hit);
            }
            debug!(field = %kind, selector, "override matched nothing usable; trying heuristics");
        }

        let elements = match page.elements().await {
            Ok(elements) => elements,
            Err(err) => {
                warn!(field = %kind, error = %err, "document unavailable");
                return None;
            }
        };
        let hit = self.resolve_in(kind, &elements);
        match &hit {
            Some(res) => debug!(field = %kind, element = %res.element.id, source = ?res.source, "resolved"),
            None => debug!(field = %kind, "no candidate matched"),
        }
        hit
    }
}
