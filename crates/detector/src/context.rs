//! Auxiliary browsing context seam and its in-memory implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use autologin_page_model::{ElementId, ElementSnapshot, MemoryPage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::DetectorError;

/// User input delivered to the capture layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum Gesture {
    PointerMove { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Escape,
}

/// An isolated browsing context showing the detection target.
#[async_trait]
pub trait AuxContext: Send + Sync {
    /// Document finished loading
    async fn is_loaded(&self) -> bool;

    /// Cover the page with a capture layer and show `tooltip`. Fails with
    /// [`DetectorError::Blocked`] when the document cannot be introspected.
    async fn install_overlay(&self, tooltip: &str) -> Result<(), DetectorError>;

    /// Next gesture on the capture layer; `None` once the context is gone.
    async fn next_gesture(&self) -> Option<Gesture>;

    /// Element under the overlay at the given viewport point
    async fn element_at(&self, x: f64, y: f64) -> Option<ElementSnapshot>;

    /// Apply `outline` to `element`, clearing any previous highlight
    async fn set_highlight(&self, element: Option<ElementId>, outline: &str);

    async fn remove_overlay(&self);

    async fn close(&self);
}

#[async_trait]
pub trait AuxContextOpener: Send + Sync {
    async fn open(&self, address: &str) -> Result<Arc<dyn AuxContext>, DetectorError>;
}

/// Scripted user input for in-memory contexts.
///
/// Gestures go to the context that is currently open. While none is open they
/// queue up for the next one. Whatever a context has not consumed when it
/// closes is discarded along with it.
#[derive(Clone, Default)]
pub struct GestureFeed {
    route: Arc<Mutex<GestureRoute>>,
}

#[derive(Default)]
struct GestureRoute {
    pending: VecDeque<Gesture>,
    current: Option<(u64, mpsc::UnboundedSender<Gesture>)>,
    opened: u64,
}

impl GestureFeed {
    pub fn send(&self, gesture: Gesture) {
        let mut route = self.route.lock();
        let delivered = match &route.current {
            Some((_, sender)) => sender.send(gesture).is_ok(),
            None => false,
        };
        if !delivered {
            route.current = None;
            route.pending.push_back(gesture);
        }
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        self.send(Gesture::PointerMove { x, y })
    }

    pub fn click(&self, x: f64, y: f64) {
        self.send(Gesture::Click { x, y })
    }

    pub fn escape(&self) {
        self.send(Gesture::Escape)
    }

    /// Gestures waiting for a context to open
    pub fn pending(&self) -> usize {
        self.route.lock().pending.len()
    }

    /// Route from now on into a fresh stream, starting with the backlog.
    fn attach(&self) -> (u64, mpsc::UnboundedReceiver<Gesture>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut route = self.route.lock();
        for gesture in route.pending.drain(..) {
            let _ = sender.send(gesture);
        }
        route.opened += 1;
        let stream = route.opened;
        route.current = Some((stream, sender));
        (stream, receiver)
    }

    fn detach(&self, stream: u64) {
        let mut route = self.route.lock();
        if route.current.as_ref().map(|(current, _)| *current) == Some(stream) {
            route.current = None;
        }
    }
}

/// Context over a [`MemoryPage`]. Readiness and cross-origin status come from
/// the page itself.
pub struct MemoryAuxContext {
    page: Arc<MemoryPage>,
    feed: GestureFeed,
    stream: u64,
    gestures: tokio::sync::Mutex<mpsc::UnboundedReceiver<Gesture>>,
    overlay: Mutex<Option<String>>,
    highlighted: Mutex<Option<ElementId>>,
    closed: AtomicBool,
}

impl MemoryAuxContext {
    pub fn new(page: Arc<MemoryPage>) -> (Self, GestureFeed) {
        let feed = GestureFeed::default();
        (Self::attached(page, &feed), feed)
    }

    fn attached(page: Arc<MemoryPage>, feed: &GestureFeed) -> Self {
        let (stream, receiver) = feed.attach();
        Self {
            page,
            feed: feed.clone(),
            stream,
            gestures: tokio::sync::Mutex::new(receiver),
            overlay: Mutex::new(None),
            highlighted: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> &Arc<MemoryPage> {
        &self.page
    }

    pub fn tooltip(&self) -> Option<String> {
        self.overlay.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuxContext for MemoryAuxContext {
    async fn is_loaded(&self) -> bool {
        !self.is_closed() && self.page.is_ready()
    }

    async fn install_overlay(&self, tooltip: &str) -> Result<(), DetectorError> {
        if self.is_closed() {
            return Err(DetectorError::Closed);
        }
        if self.page.is_cross_origin() {
            return Err(DetectorError::Blocked(format!(
                "{} refuses script access",
                self.page.current_address()
            )));
        }
        *self.overlay.lock() = Some(tooltip.to_string());
        Ok(())
    }

    async fn next_gesture(&self) -> Option<Gesture> {
        if self.is_closed() {
            return None;
        }
        self.gestures.lock().await.recv().await
    }

    async fn element_at(&self, x: f64, y: f64) -> Option<ElementSnapshot> {
        self.page.element_at(x, y)
    }

    async fn set_highlight(&self, element: Option<ElementId>, outline: &str) {
        let mut current = self.highlighted.lock();
        if *current == element {
            return;
        }
        if let Some(previous) = current.take() {
            self.page.set_outline(previous, None);
        }
        if let Some(id) = element {
            self.page.set_outline(id, Some(outline.to_string()));
        }
        *current = element;
    }

    async fn remove_overlay(&self) {
        if let Some(previous) = self.highlighted.lock().take() {
            self.page.set_outline(previous, None);
        }
        self.overlay.lock().take();
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.feed.detach(self.stream);
        let mut gestures = self.gestures.lock().await;
        gestures.close();
        let mut dropped = 0usize;
        while gestures.try_recv().is_ok() {
            dropped += 1;
        }
        debug!(address = %self.page.current_address(), dropped, "auxiliary context closed");
    }
}

/// Opens every address onto the same in-memory page. Each context gets the
/// gestures fed while it is the open one.
pub struct MemoryOpener {
    page: Arc<MemoryPage>,
    feed: GestureFeed,
    opened: Mutex<Vec<Arc<MemoryAuxContext>>>,
    opens: AtomicUsize,
}

impl MemoryOpener {
    pub fn new(page: Arc<MemoryPage>) -> (Self, GestureFeed) {
        let feed = GestureFeed::default();
        let opener = Self {
            page,
            feed: feed.clone(),
            opened: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
        };
        (opener, feed)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Contexts handed out so far, oldest first
    pub fn contexts(&self) -> Vec<Arc<MemoryAuxContext>> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl AuxContextOpener for MemoryOpener {
    async fn open(&self, address: &str) -> Result<Arc<dyn AuxContext>, DetectorError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        debug!(address, "opening auxiliary context");
        let ctx = Arc::new(MemoryAuxContext::attached(
            Arc::clone(&self.page),
            &self.feed,
        ));
        self.opened.lock().push(Arc::clone(&ctx));
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autologin_page_model::ElementSpec;

    #[tokio::test]
    async fn highlight_moves_between_elements() {
        let page = Arc::new(MemoryPage::new("https://example.com"));
        let a = page.add(ElementSpec::input("text"));
        let b = page.add(ElementSpec::button("Go"));
        let (ctx, _feed) = MemoryAuxContext::new(Arc::clone(&page));

        ctx.set_highlight(Some(a), "1px solid red").await;
        ctx.set_highlight(Some(b), "1px solid red").await;
        assert_eq!(page.outline_of(a), None);
        assert_eq!(page.outline_of(b).as_deref(), Some("1px solid red"));

        ctx.remove_overlay().await;
        assert_eq!(page.outline_of(b), None);
    }

    #[tokio::test]
    async fn cross_origin_page_blocks_overlay() {
        let page = Arc::new(MemoryPage::new("https://other.example.net"));
        page.set_cross_origin(true);
        let (ctx, _feed) = MemoryAuxContext::new(page);
        assert!(matches!(
            ctx.install_overlay("tip").await,
            Err(DetectorError::Blocked(_))
        ));
        assert!(ctx.tooltip().is_none());
    }

    #[tokio::test]
    async fn closed_context_yields_no_gestures() {
        let page = Arc::new(MemoryPage::new("https://example.com"));
        let (ctx, feed) = MemoryAuxContext::new(page);
        feed.escape();
        ctx.close().await;
        assert!(ctx.is_closed());
        assert_eq!(ctx.next_gesture().await, None);
        assert!(!ctx.is_loaded().await);
    }

    #[tokio::test]
    async fn leftovers_of_a_closed_context_do_not_reach_the_next_one() {
        let page = Arc::new(MemoryPage::new("https://example.com"));
        let (opener, feed) = MemoryOpener::new(page);

        feed.escape();
        feed.click(1.0, 1.0);
        assert_eq!(feed.pending(), 2);
        let first = opener.open("https://example.com").await.unwrap();
        assert_eq!(feed.pending(), 0);
        assert_eq!(first.next_gesture().await, Some(Gesture::Escape));
        first.close().await;

        feed.pointer_move(5.0, 5.0);
        assert_eq!(feed.pending(), 1);
        let second = opener.open("https://example.com").await.unwrap();
        assert_eq!(second.next_gesture().await, Some(Gesture::PointerMove { x: 5.0, y: 5.0 }));

        feed.escape();
        assert_eq!(feed.pending(), 0);
        assert_eq!(second.next_gesture().await, Some(Gesture::Escape));
        assert_eq!(first.next_gesture().await, None);
    }

    #[test]
    fn gestures_deserialize_from_scripts() {
        let raw = r#"[{"gesture":"pointer_move","x":1,"y":2},{"gesture":"escape"}]"#;
        let parsed: Vec<Gesture> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[1], Gesture::Escape);
    }
}
