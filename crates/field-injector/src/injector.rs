use std::sync::Arc;
use std::time::Duration;

use autologin_page_model::{DomEvent, ElementId, PagePort};
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::errors::InjectError;
use crate::model::{ActionOutcome, InjectOutcome, InjectReport};
use crate::tempo::{FixedTempo, Tempo, TypingPlan};

/// Types values into fields following a [`Tempo`].
///
/// Values are treated as secrets: only their length is ever logged.
#[derive(Clone)]
pub struct FieldInjector {
    tempo: Arc<dyn Tempo>,
}

impl Default for FieldInjector {
    fn default() -> Self {
        Self::new(Arc::new(FixedTempo::default()))
    }
}

impl FieldInjector {
    pub fn new(tempo: Arc<dyn Tempo>) -> Self {
        Self { tempo }
    }

    pub fn with_keystroke_delay(delay_ms: u64) -> Self {
        Self::new(Arc::new(FixedTempo::new(delay_ms)))
    }

    /// Overwrite the value of `element` with `value`.
    ///
    /// Safe to call again on the same element; each call clears first and
    /// emits exactly one `change`/`blur` pair.
    #[instrument(skip_all, fields(element = %element, len = value.chars().count()))]
    pub async fn inject(&self, page: &dyn PagePort, element: ElementId, value: &str) -> InjectOutcome {
        let plan = self.tempo.build_plan(value);
        let started = Instant::now();
        match run_plan(page, element, &plan).await {
            Ok(chars) => {
                let elapsed = started.elapsed();
                debug!(chars, elapsed_ms = elapsed.as_millis() as u64, "field filled");
                InjectOutcome::Success(InjectReport { chars, elapsed })
            }
            Err(err) => {
                report_failure(&err);
                InjectOutcome::Detached
            }
        }
    }
}

async fn run_plan(
    page: &dyn PagePort,
    element: ElementId,
    plan: &TypingPlan,
) -> Result<usize, InjectError> {
    emit(page, element, DomEvent::Focus).await?;
    write_value(page, element, "").await?;

    let mut typed = String::new();
    for step in &plan.steps {
        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }
        typed.push_str(&step.chunk);
        write_value(page, element, &typed).await?;
        emit(page, element, DomEvent::Input).await?;
        emit(page, element, DomEvent::key_up(step.chunk.clone())).await?;
    }

    emit(page, element, DomEvent::Change).await?;
    emit(page, element, DomEvent::Blur).await?;
    Ok(typed.chars().count())
}

async fn ensure_attached(page: &dyn PagePort, element: ElementId) -> Result<(), InjectError> {
    if page.is_attached(element).await {
        Ok(())
    } else {
        Err(InjectError::Detached(element))
    }
}

async fn write_value(page: &dyn PagePort, element: ElementId, value: &str) -> Result<(), InjectError> {
    ensure_attached(page, element).await?;
    page.set_value(element, value)
        .await
        .map_err(|err| InjectError::from_page(element, err))
}

async fn emit(page: &dyn PagePort, element: ElementId, event: DomEvent) -> Result<(), InjectError> {
    ensure_attached(page, element).await?;
    page.dispatch(element, event)
        .await
        .map_err(|err| InjectError::from_page(element, err))
}

fn report_failure(err: &InjectError) {
    match err {
        InjectError::Detached(_) => debug!(error = %err, "injection stopped"),
        InjectError::Page { .. } => warn!(error = %err, "injection aborted"),
    }
}

/// Click `element`.
pub async fn click(page: &dyn PagePort, element: ElementId) -> ActionOutcome {
    single(page, element, DomEvent::Click).await
}

/// Dispatch `keydown` Enter on `element`.
pub async fn press_enter(page: &dyn PagePort, element: ElementId) -> ActionOutcome {
    single(page, element, DomEvent::enter()).await
}

async fn single(page: &dyn PagePort, element: ElementId, event: DomEvent) -> ActionOutcome {
    let name = event.name();
    match emit(page, element, event).await {
        Ok(()) => {
            debug!(element = %element, event = name, "dispatched");
            ActionOutcome::Done
        }
        Err(err) => {
            report_failure(&err);
            ActionOutcome::Detached
        }
    }
}
