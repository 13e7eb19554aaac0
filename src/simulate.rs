//! Offline orchestration runs over page fixtures
//!
//! Each fixture stands for one page load. The first one is opened with the
//! profile's session attached; a hand-off carries the re-armed fragment into
//! the next fixture, the way a browser keeps the fragment across the
//! navigation.

use anyhow::{Context, Result};
use autologin_core_types::SiteProfile;
use autologin_engine::{drain, Orchestrator, OrchestrationEvent, RunOutcome, RunReport};
use autologin_page_model::{MemoryPage, PageFixture, PagePort};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Debug, Serialize)]
pub struct PageRun {
    /// Page address without its fragment
    pub address: String,
    pub report: RunReport,
    pub events: Vec<OrchestrationEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub profile: String,
    pub pages: Vec<PageRun>,
}

impl SimulationReport {
    pub fn outcome(&self) -> RunOutcome {
        self.pages
            .last()
            .map(|run| run.report.outcome)
            .unwrap_or(RunOutcome::Idle)
    }
}

pub async fn simulate(
    orchestrator: &Orchestrator,
    profile: &SiteProfile,
    fixtures: Vec<PageFixture>,
    cancel: &CancellationToken,
) -> Result<SimulationReport> {
    let launch = autologin_engine::launch_address(profile)
        .with_context(|| format!("Cannot launch profile '{}'", profile.name))?;
    let mut carried = autologin_transport::fragment_of(&launch).map(str::to_string);
    let total = fixtures.len();
    let mut pages = Vec::with_capacity(total);

    for (index, mut fixture) in fixtures.into_iter().enumerate() {
        let Some(fragment) = carried.take() else {
            break;
        };
        if fixture.address.is_empty() {
            fixture.address = profile.address.clone();
        }
        let page = MemoryPage::from_fixture(fixture)
            .with_context(|| format!("Invalid page fixture #{}", index + 1))?;
        page.set_fragment(&fragment)
            .await
            .context("Failed to arm page fixture")?;

        let mut events = orchestrator.subscribe();
        let report = orchestrator.run(&page, cancel).await;
        let seen = drain(&mut events);

        let address = page.current_address();
        info!(page = index + 1, outcome = ?report.outcome, attempts = report.attempts, "page run finished");
        if report.outcome == RunOutcome::HandedOff {
            carried = autologin_transport::fragment_of(&address).map(str::to_string);
        }
        pages.push(PageRun {
            address: strip_fragment(&address).to_string(),
            report,
            events: seen,
        });
    }

    if pages.len() < total {
        warn!(used = pages.len(), total, "run settled before every fixture was visited");
    }

    Ok(SimulationReport {
        profile: profile.name.clone(),
        pages,
    })
}

fn strip_fragment(address: &str) -> &str {
    address.split_once('#').map_or(address, |(base, _)| base)
}
