use std::sync::Arc;

use autologin_core_types::{DetectionRequest, DetectionResult, FieldKind};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::context::{AuxContext, AuxContextOpener, Gesture};
use crate::errors::DetectorError;
use crate::selector::derive_selector;

/// How a detection request settled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionOutcome {
    Selected(DetectionResult),
    Cancelled,
    TimedOut,
    Blocked { reason: String },
    /// A capture for the same field kind is still in flight
    Busy,
}

impl DetectionOutcome {
    pub fn into_result(self) -> Option<DetectionResult> {
        match self {
            DetectionOutcome::Selected(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaptureRecord {
    pub request_id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
}

/// How the auxiliary side ended.
#[derive(Debug)]
enum CaptureEnd {
    Posted,
    Escaped,
    Blocked(String),
    /// Torn down from outside, or the context went away
    Aborted,
}

pub fn tooltip_for(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Username => "Click the username/email field",
        FieldKind::Password => "Click the password field",
        FieldKind::Submit => "Click the submit/login button",
    }
}

/// Removes the registry entry when the request settles.
struct InFlight<'a> {
    captures: &'a DashMap<FieldKind, CaptureRecord>,
    kind: FieldKind,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.captures.remove(&self.kind);
    }
}

pub struct FieldDetector {
    opener: Arc<dyn AuxContextOpener>,
    config: DetectorConfig,
    captures: DashMap<FieldKind, CaptureRecord>,
}

impl FieldDetector {
    pub fn new(opener: Arc<dyn AuxContextOpener>, config: DetectorConfig) -> Self {
        Self {
            opener,
            config,
            captures: DashMap::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn in_flight(&self, kind: FieldKind) -> Option<CaptureRecord> {
        self.captures.get(&kind).map(|entry| entry.clone())
    }

    /// Open the target, wait for one click and derive a selector for it.
    #[instrument(skip_all, fields(field = %request.field_kind, target = %request.target))]
    pub async fn detect(&self, request: DetectionRequest) -> DetectionOutcome {
        let kind = request.field_kind;
        let request_id = Uuid::new_v4();
        let _guard = match self.captures.entry(kind) {
            Entry::Occupied(existing) => {
                debug!(busy_with = %existing.get().request_id, "capture already in flight");
                return DetectionOutcome::Busy;
            }
            Entry::Vacant(slot) => {
                slot.insert(CaptureRecord {
                    request_id,
                    target: request.target.clone(),
                    started_at: Utc::now(),
                });
                InFlight {
                    captures: &self.captures,
                    kind,
                }
            }
        };
        info!(%request_id, "detection started");

        let context = match self.opener.open(&request.target).await {
            Ok(context) => context,
            Err(err) => {
                warn!(%request_id, error = %err, "auxiliary context unavailable");
                return DetectionOutcome::Blocked {
                    reason: err.to_string(),
                };
            }
        };

        let (tx, mut rx) = mpsc::channel::<DetectionResult>(1);
        let teardown = CancellationToken::new();
        let handle = tokio::spawn(capture_session(
            Arc::clone(&context),
            kind,
            self.config.clone(),
            tx,
            teardown.clone(),
        ));

        let received = timeout(self.config.timeout(), rx.recv()).await;
        // Exactly one message per request; anything later goes nowhere
        drop(rx);

        let outcome = match received {
            Ok(Some(result)) => {
                let _ = handle.await;
                DetectionOutcome::Selected(result)
            }
            Ok(None) => match handle.await {
                Ok(CaptureEnd::Blocked(reason)) => DetectionOutcome::Blocked { reason },
                Ok(end) => {
                    debug!(?end, "capture ended without a selection");
                    DetectionOutcome::Cancelled
                }
                Err(err) => {
                    warn!(error = %err, "capture task failed");
                    DetectionOutcome::Cancelled
                }
            },
            Err(_) => {
                teardown.cancel();
                let _ = handle.await;
                warn!(%request_id, timeout_ms = self.config.timeout_ms, "detection timed out");
                DetectionOutcome::TimedOut
            }
        };
        info!(%request_id, outcome = outcome_label(&outcome), "detection settled");
        outcome
    }
}

fn outcome_label(outcome: &DetectionOutcome) -> &'static str {
    match outcome {
        DetectionOutcome::Selected(_) => "selected",
        DetectionOutcome::Cancelled => "cancelled",
        DetectionOutcome::TimedOut => "timed_out",
        DetectionOutcome::Blocked { .. } => "blocked",
        DetectionOutcome::Busy => "busy",
    }
}

/// Auxiliary side: runs until it posts, is escaped, is blocked or is torn
/// down, then removes the overlay and closes the context.
async fn capture_session(
    context: Arc<dyn AuxContext>,
    kind: FieldKind,
    config: DetectorConfig,
    tx: mpsc::Sender<DetectionResult>,
    teardown: CancellationToken,
) -> CaptureEnd {
    let end = tokio::select! {
        biased;
        _ = teardown.cancelled() => CaptureEnd::Aborted,
        end = capture(context.as_ref(), kind, &config, &tx) => end,
    };
    drop(tx);
    context.remove_overlay().await;
    context.close().await;
    end
}

async fn capture(
    context: &dyn AuxContext,
    kind: FieldKind,
    config: &DetectorConfig,
    tx: &mpsc::Sender<DetectionResult>,
) -> CaptureEnd {
    while !context.is_loaded().await {
        sleep(config.load_poll()).await;
    }
    if let Err(err) = context.install_overlay(tooltip_for(kind)).await {
        return match err {
            DetectorError::Closed => CaptureEnd::Aborted,
            other => CaptureEnd::Blocked(other.to_string()),
        };
    }

    loop {
        match context.next_gesture().await {
            None => return CaptureEnd::Aborted,
            Some(Gesture::Escape) => return CaptureEnd::Escaped,
            Some(Gesture::PointerMove { x, y }) => {
                let target = context
                    .element_at(x, y)
                    .await
                    .filter(|el| el.is_interactive())
                    .map(|el| el.id);
                context
                    .set_highlight(target, &config.highlight_outline)
                    .await;
            }
            Some(Gesture::Click { x, y }) => {
                let Some(element) = context.element_at(x, y).await else {
                    continue;
                };
                let result = DetectionResult {
                    field_kind: kind,
                    selector: derive_selector(&element),
                    element_descriptor: element.descriptor(),
                };
                if tx.send(result).await.is_err() {
                    return CaptureEnd::Aborted;
                }
                return CaptureEnd::Posted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::MemoryOpener;
    use autologin_page_model::{ElementSpec, MemoryPage};

    fn login_page() -> Arc<MemoryPage> {
        let page = MemoryPage::new("https://example.com/login");
        page.add(ElementSpec::new("div").at(0.0, 0.0, 800.0, 600.0));
        page.add(
            ElementSpec::input("text")
                .id("user")
                .class("form-control")
                .at(10.0, 10.0, 200.0, 30.0),
        );
        page.add(
            ElementSpec::input("password")
                .name("pwd")
                .at(10.0, 50.0, 200.0, 30.0),
        );
        Arc::new(page)
    }

    fn detector(page: Arc<MemoryPage>) -> (Arc<FieldDetector>, Arc<MemoryOpener>, crate::GestureFeed) {
        let (opener, feed) = MemoryOpener::new(page);
        let opener = Arc::new(opener);
        let detector = FieldDetector::new(opener.clone(), DetectorConfig::default());
        (Arc::new(detector), opener, feed)
    }

    #[tokio::test(start_paused = true)]
    async fn click_posts_selector_and_closes_context() {
        let page = login_page();
        let (detector, opener, feed) = detector(Arc::clone(&page));
        feed.pointer_move(20.0, 60.0);
        feed.click(20.0, 60.0);

        let outcome = detector
            .detect(DetectionRequest::new(FieldKind::Password, "https://example.com/login"))
            .await;

        let result = outcome.into_result().unwrap();
        assert_eq!(result.selector, "[name=\"pwd\"]");
        assert_eq!(result.field_kind, FieldKind::Password);
        assert_eq!(result.element_descriptor.input_type.as_deref(), Some("password"));
        let ctx = &opener.contexts()[0];
        assert!(ctx.is_closed());
        assert!(ctx.tooltip().is_none());
        assert!(page.outlined().is_empty());
        assert!(detector.in_flight(FieldKind::Password).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_highlights_only_inputs_and_buttons() {
        let page = login_page();
        let (detector, opener, feed) = detector(Arc::clone(&page));
        let worker = Arc::clone(&detector);
        let task = tokio::spawn(async move {
            worker
                .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
                .await
        });

        feed.pointer_move(20.0, 20.0);
        sleep(Duration::from_millis(10)).await;
        let ctx = opener.contexts()[0].clone();
        assert_eq!(ctx.tooltip().as_deref(), Some("Click the username/email field"));
        assert_eq!(
            page.outline_of(autologin_page_model::ElementId(1)).as_deref(),
            Some(crate::config::DEFAULT_OUTLINE)
        );

        feed.pointer_move(700.0, 500.0);
        sleep(Duration::from_millis(10)).await;
        assert!(page.outlined().is_empty());

        feed.escape();
        assert_eq!(task.await.unwrap(), DetectionOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_cancels_and_ignores_stray_click() {
        let page = login_page();
        let (detector, opener, feed) = detector(page);
        feed.escape();
        feed.click(20.0, 20.0);

        let outcome = detector
            .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
            .await;

        assert_eq!(outcome, DetectionOutcome::Cancelled);
        assert!(opener.contexts()[0].is_closed());

        let next = detector
            .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
            .await;
        assert_eq!(next, DetectionOutcome::TimedOut);
        assert_eq!(opener.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_click_times_out_and_closes_context() {
        let page = login_page();
        let (detector, opener, _feed) = detector(page);
        let started = tokio::time::Instant::now();

        let outcome = detector
            .detect(DetectionRequest::new(FieldKind::Submit, "https://example.com/login"))
            .await;

        assert_eq!(outcome, DetectionOutcome::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert!(opener.contexts()[0].is_closed());
        assert!(detector.in_flight(FieldKind::Submit).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn page_that_never_loads_counts_against_timeout() {
        let page = login_page();
        page.set_ready(false);
        let (detector, opener, feed) = detector(page);
        feed.click(20.0, 20.0);

        let outcome = detector
            .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
            .await;

        assert_eq!(outcome, DetectionOutcome::TimedOut);
        assert!(opener.contexts()[0].tooltip().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cross_origin_target_is_blocked() {
        let page = login_page();
        page.set_cross_origin(true);
        let (detector, opener, _feed) = detector(page);

        let outcome = detector
            .detect(DetectionRequest::new(FieldKind::Username, "https://sso.example.net"))
            .await;

        assert!(matches!(outcome, DetectionOutcome::Blocked { .. }));
        assert!(opener.contexts()[0].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_for_busy_kind_does_not_open_context() {
        let page = login_page();
        let (detector, opener, feed) = detector(page);
        let worker = Arc::clone(&detector);
        let first = tokio::spawn(async move {
            worker
                .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
                .await
        });
        sleep(Duration::from_millis(1)).await;
        assert!(detector.in_flight(FieldKind::Username).is_some());

        let second = detector
            .detect(DetectionRequest::new(FieldKind::Username, "https://example.com/login"))
            .await;
        assert_eq!(second, DetectionOutcome::Busy);
        assert_eq!(opener.open_count(), 1);

        feed.click(20.0, 20.0);
        let first = first.await.unwrap().into_result().unwrap();
        assert_eq!(first.selector, "#user");
        assert!(detector.in_flight(FieldKind::Username).is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let raw = serde_json::to_value(DetectionOutcome::Blocked {
            reason: "x".into(),
        })
        .unwrap();
        assert_eq!(raw["status"], "blocked");
    }
}
