use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use autologin_engine::{LastUsedHook, Orchestrator};
use autologin_page_model::PageFixture;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::context::CliContext;
use super::output::emit;
use super::runtime::read_document;
use crate::simulate::{simulate, SimulationReport};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Profile name or id
    pub profile: String,

    /// Page fixture for each page load, in order (JSON or YAML)
    #[arg(long = "page", value_name = "FILE", required = true)]
    pub pages: Vec<PathBuf>,

    /// Override the polling interval
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Override the number of polling attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Leave the profile's lastUsed timestamp untouched
    #[arg(long)]
    pub no_touch: bool,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.profiles().await?;
    let profile = store.get(&args.profile)?;

    let mut fixtures = Vec::with_capacity(args.pages.len());
    for path in &args.pages {
        fixtures.push(read_document::<PageFixture>(path).await?);
    }

    let mut engine = ctx.config().engine.clone();
    if let Some(interval) = args.poll_interval_ms {
        engine.poll_interval_ms = interval;
    }
    if let Some(attempts) = args.max_attempts {
        engine.max_attempts = attempts;
    }

    let mut builder = Orchestrator::builder().config(engine);
    if !args.no_touch {
        let hook: Arc<dyn LastUsedHook> = store.clone();
        builder = builder.last_used_hook(hook);
    }
    let orchestrator = builder.build()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling simulation");
            interrupt.cancel();
        }
    });

    let report = simulate(&orchestrator, &profile, fixtures, &cancel).await;
    watcher.abort();
    let report = report?;

    emit(ctx.output(), &report, render_human)
}

fn render_human(report: &SimulationReport) -> String {
    let mut lines = vec![format!("Profile: {}", report.profile)];
    for (index, run) in report.pages.iter().enumerate() {
        lines.push(format!(
            "  page {} {}: {:?} after {} attempt(s), state {}",
            index + 1,
            run.address,
            run.report.outcome,
            run.report.attempts,
            run.report.state
        ));
    }
    lines.push(format!("Outcome: {:?}", report.outcome()));
    lines.join("\n")
}
