use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use autologin_core_types::{DetectionRequest, FieldKind};
use autologin_detector::{DetectionOutcome, FieldDetector, Gesture, MemoryOpener};
use autologin_page_model::{MemoryPage, PageFixture};
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::output::emit;
use super::runtime::read_document;

#[derive(Args, Clone, Debug)]
pub struct DetectArgs {
    /// Field to capture: username, password or submit
    #[arg(long)]
    pub field: FieldKind,

    /// Page fixture opened in the auxiliary context (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Gestures replayed on the capture layer (JSON or YAML list)
    #[arg(long, value_name = "FILE")]
    pub gestures: PathBuf,

    /// Store the captured selector on this profile
    #[arg(long, value_name = "PROFILE")]
    pub save_to: Option<String>,

    /// Override the detection timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub async fn cmd_detect(args: DetectArgs, ctx: &CliContext) -> Result<()> {
    let fixture: PageFixture = read_document(&args.page).await?;
    let gestures: Vec<Gesture> = read_document(&args.gestures).await?;

    let mut config = ctx.config().detector.clone();
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let page = Arc::new(
        MemoryPage::from_fixture(fixture)
            .with_context(|| format!("Invalid page fixture {}", args.page.display()))?,
    );
    let target = page.current_address();
    let (opener, feed) = MemoryOpener::new(page);
    for gesture in gestures {
        feed.send(gesture);
    }

    let detector = FieldDetector::new(Arc::new(opener), config);
    let outcome = detector
        .detect(DetectionRequest::new(args.field, target))
        .await;
    drop(feed);

    if let (DetectionOutcome::Selected(result), Some(key)) = (&outcome, &args.save_to) {
        let store = ctx.profiles().await?;
        store.set_selector(key, result.field_kind, &result.selector)?;
        store.save().await?;
        info!(profile = %key, field = %result.field_kind, selector = %result.selector, "selector saved");
    }

    emit(ctx.output(), &outcome, |outcome| match outcome {
        DetectionOutcome::Selected(result) => {
            format!("{} -> {}", result.field_kind, result.selector)
        }
        DetectionOutcome::Cancelled => "cancelled".to_string(),
        DetectionOutcome::TimedOut => "timed out".to_string(),
        DetectionOutcome::Blocked { reason } => format!("blocked: {reason}"),
        DetectionOutcome::Busy => "busy".to_string(),
    })?;

    if !matches!(outcome, DetectionOutcome::Selected(_)) {
        bail!("No element captured");
    }
    Ok(())
}
