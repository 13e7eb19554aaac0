//! Autofill orchestration
//!
//! One [`Orchestrator::run`] covers one page load:
//! 1. Decode the transport channel; no session means the run stays idle
//! 2. Poll on a fixed interval, resolving all three fields per tick
//! 3. Fill and submit once the fields the flow needs are present
//! 4. On the first page of a multi-page login, re-arm the channel and hand off
//! 5. Give up after `max_attempts` ticks

use std::sync::Arc;

use autologin_core_types::{FlowKind, SessionPayload};
use autologin_injector::{click, press_enter, ActionOutcome, FieldInjector, InjectOutcome};
use autologin_locator::{FieldResolver, FieldSet, HeuristicResolver, Resolution};
use autologin_page_model::PagePort;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EventHub, OrchestrationEvent, SubmitVia};
use crate::hooks::LastUsedHook;
use crate::state::{FillStep, OrchestrationState, RunOutcome, RunReport};

pub struct OrchestratorBuilder {
    config: EngineConfig,
    resolver: Option<Arc<dyn FieldResolver>>,
    injector: Option<FieldInjector>,
    events: Option<EventHub>,
    hook: Option<Arc<dyn LastUsedHook>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn FieldResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn injector(mut self, injector: FieldInjector) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Publish on an existing hub instead of a private one
    pub fn events(mut self, events: EventHub) -> Self {
        self.events = Some(events);
        self
    }

    pub fn last_used_hook(mut self, hook: Arc<dyn LastUsedHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<Orchestrator, EngineError> {
        self.config.validate()?;
        let injector = self
            .injector
            .unwrap_or_else(|| FieldInjector::with_keystroke_delay(self.config.keystroke_delay_ms));
        Ok(Orchestrator {
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(HeuristicResolver::default())),
            injector,
            events: self.events.unwrap_or_default(),
            hook: self.hook,
            config: self.config,
        })
    }
}

pub struct Orchestrator {
    config: EngineConfig,
    resolver: Arc<dyn FieldResolver>,
    injector: FieldInjector,
    events: EventHub,
    hook: Option<Arc<dyn LastUsedHook>>,
}

/// What the fields found in one tick allow.
enum Step<'a> {
    Combined {
        username: &'a Resolution,
        password: &'a Resolution,
    },
    IdentityOnly(&'a Resolution),
    SecretOnly(&'a Resolution),
}

enum TickOutcome {
    Pending,
    Filled(FillStep),
    Rearm,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: EngineConfig::default(),
            resolver: None,
            injector: None,
            events: None,
            hook: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.events.subscribe()
    }

    /// Drive one orchestration instance against `page` until it settles.
    #[instrument(skip_all)]
    pub async fn run(&self, page: &dyn PagePort, cancel: &CancellationToken) -> RunReport {
        let address = match page.address().await {
            Ok(address) => address,
            Err(err) => {
                warn!(error = %err, "page address unavailable");
                return RunReport::idle();
            }
        };
        let Some(payload) = autologin_transport::decode_address(&address) else {
            debug!("no session in transport channel");
            return RunReport::idle();
        };
        let base = strip_fragment(&address).to_string();
        info!(flow = %payload.flow, address = %base, "session found, polling for login fields");
        self.emit(OrchestrationEvent::SessionFound {
            flow: payload.flow,
            address: base.clone(),
        });

        let mut report = RunReport {
            state: OrchestrationState::Idle,
            outcome: RunOutcome::Idle,
            attempts: 0,
            flow: Some(payload.flow),
        };
        self.transition(&mut report, OrchestrationState::Polling);

        let period = self.config.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while report.attempts < self.config.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(report),
                _ = ticker.tick() => {}
            }
            report.attempts += 1;

            match self.tick(page, &payload, report.attempts).await {
                TickOutcome::Pending => continue,
                TickOutcome::Filled(step) => {
                    info!(attempt = report.attempts, step = ?step, "login submitted");
                    self.transition(&mut report, OrchestrationState::Filled);
                    report.outcome = RunOutcome::Filled { step };
                    self.clear_channel(page).await;
                    if let Some(hook) = &self.hook {
                        hook.mark_used(&base, Utc::now()).await;
                    }
                    return report;
                }
                TickOutcome::Rearm => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return self.cancelled(report),
                        _ = sleep(self.config.rearm_delay()) => {}
                    }
                    let fragment = autologin_transport::encode(&payload);
                    if let Err(err) = page.set_fragment(&fragment).await {
                        warn!(error = %err, "failed to re-arm transport channel");
                    }
                    info!(attempt = report.attempts, "username submitted, handing off to next page");
                    self.emit(OrchestrationEvent::Rearmed {
                        attempt: report.attempts,
                    });
                    report.outcome = RunOutcome::HandedOff;
                    return report;
                }
            }
        }

        warn!(
            attempts = report.attempts,
            "login fields not found, giving up"
        );
        self.transition(&mut report, OrchestrationState::TimedOut);
        self.emit(OrchestrationEvent::TimedOut {
            attempts: report.attempts,
        });
        report.outcome = RunOutcome::TimedOut;
        self.clear_channel(page).await;
        report
    }

    async fn tick(&self, page: &dyn PagePort, payload: &SessionPayload, attempt: u32) -> TickOutcome {
        let fields = self.resolver.resolve_all(page, &payload.overrides).await;
        self.emit(OrchestrationEvent::Tick {
            attempt,
            username: fields.username.is_some(),
            password: fields.password.is_some(),
            submit: fields.submit.is_some(),
        });

        let Some(step) = plan_step(payload.flow, &fields) else {
            trace!(attempt, missing = ?fields.missing(), "fields incomplete");
            return TickOutcome::Pending;
        };
        let submit = fields.submit.as_ref();

        match step {
            Step::Combined { username, password } => {
                if !self.fill(page, username, &payload.identity, attempt).await {
                    return TickOutcome::Pending;
                }
                sleep(self.config.field_settle()).await;
                if !self.fill(page, password, &payload.secret, attempt).await {
                    return TickOutcome::Pending;
                }
                sleep(self.config.submit_settle()).await;
                self.submit(page, submit, password).await;
                TickOutcome::Filled(FillStep::Combined)
            }
            Step::IdentityOnly(username) => {
                if !self.fill(page, username, &payload.identity, attempt).await {
                    return TickOutcome::Pending;
                }
                sleep(self.config.submit_settle()).await;
                self.submit(page, submit, username).await;
                TickOutcome::Rearm
            }
            Step::SecretOnly(password) => {
                if !self.fill(page, password, &payload.secret, attempt).await {
                    return TickOutcome::Pending;
                }
                sleep(self.config.submit_settle()).await;
                self.submit(page, submit, password).await;
                TickOutcome::Filled(FillStep::SecretOnly)
            }
        }
    }

    async fn fill(&self, page: &dyn PagePort, field: &Resolution, value: &str, attempt: u32) -> bool {
        match self.injector.inject(page, field.element.id, value).await {
            InjectOutcome::Success(report) => {
                self.emit(OrchestrationEvent::FieldFilled {
                    kind: field.kind,
                    chars: report.chars,
                });
                true
            }
            InjectOutcome::Detached => {
                debug!(field = %field.kind, attempt, "field detached during injection");
                self.emit(OrchestrationEvent::FieldDetached {
                    kind: field.kind,
                    attempt,
                });
                false
            }
        }
    }

    /// Click the submit control, or press Enter on `fallback` when there is
    /// none or it went away.
    async fn submit(&self, page: &dyn PagePort, submit: Option<&Resolution>, fallback: &Resolution) {
        if let Some(button) = submit {
            let delivered = click(page, button.element.id).await == ActionOutcome::Done;
            self.emit(OrchestrationEvent::Submitted {
                via: SubmitVia::Click,
                delivered,
            });
            if delivered {
                return;
            }
            debug!("submit control detached, pressing Enter instead");
        }
        let delivered = press_enter(page, fallback.element.id).await == ActionOutcome::Done;
        self.emit(OrchestrationEvent::Submitted {
            via: SubmitVia::Enter,
            delivered,
        });
    }

    fn cancelled(&self, mut report: RunReport) -> RunReport {
        info!(attempts = report.attempts, "orchestration cancelled");
        self.emit(OrchestrationEvent::Cancelled {
            attempts: report.attempts,
        });
        report.outcome = RunOutcome::Cancelled;
        report
    }

    fn transition(&self, report: &mut RunReport, to: OrchestrationState) {
        let from = report.state;
        report.state = to;
        debug!(%from, %to, "state transition");
        self.emit(OrchestrationEvent::Transition { from, to });
    }

    /// The payload must not outlive a settled instance.
    async fn clear_channel(&self, page: &dyn PagePort) {
        if let Err(err) = page.set_fragment("").await {
            debug!(error = %err, "could not clear transport channel");
        }
    }

    fn emit(&self, event: OrchestrationEvent) {
        let name = event.name();
        let delivered = self.events.publish(event);
        trace!(event = name, delivered, "run event");
    }
}

fn plan_step(flow: FlowKind, fields: &FieldSet) -> Option<Step<'_>> {
    let username = fields.username.as_ref();
    let password = fields.password.as_ref();
    // One element satisfying both heuristics is a password field
    let username = match (username, password) {
        (Some(u), Some(p)) if u.element.id == p.element.id => None,
        _ => username,
    };

    match (flow, username, password) {
        (_, Some(username), Some(password)) => Some(Step::Combined { username, password }),
        (FlowKind::MultiPage, Some(username), None) => Some(Step::IdentityOnly(username)),
        (FlowKind::MultiPage, None, Some(password)) => Some(Step::SecretOnly(password)),
        _ => None,
    }
}

fn strip_fragment(address: &str) -> &str {
    address.split_once('#').map(|(base, _)| base).unwrap_or(address)
}
