//! Injectable bundle export
//!
//! Compiles enabled profiles together with the engine timings and the
//! heuristic table into one serializable unit. The userscript rendering embeds
//! that unit next to a runtime that needs no external fetches.

use autologin_core_types::{FlowKind, SelectorOverrides, SiteProfile};
use autologin_locator::HeuristicTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;

pub const BUNDLE_FORMAT_VERSION: &str = "3.0";

const RUNTIME: &str = include_str!("userscript/runtime.js");
const BUNDLE_SLOT: &str = "/*@@BUNDLE@@*/";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundledSite {
    pub name: String,
    #[serde(rename = "url")]
    pub address: String,
    pub identity: String,
    pub secret: String,
    pub flow: FlowKind,
    pub overrides: SelectorOverrides,
}

impl From<&SiteProfile> for BundledSite {
    fn from(profile: &SiteProfile) -> Self {
        Self {
            name: profile.name.clone(),
            address: profile.address.clone(),
            identity: profile.identity.clone(),
            secret: profile.secret.clone(),
            flow: profile.flow,
            overrides: profile.overrides(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectableBundle {
    pub format_version: String,
    pub generated_at: DateTime<Utc>,
    pub engine: EngineConfig,
    pub heuristics: HeuristicTable,
    pub sites: Vec<BundledSite>,
}

impl InjectableBundle {
    /// Keeps enabled profiles that pass validation; the rest are logged and skipped.
    pub fn compile(profiles: &[SiteProfile], engine: EngineConfig) -> Self {
        let sites: Vec<BundledSite> = profiles
            .iter()
            .filter(|profile| profile.enabled)
            .filter(|profile| match profile.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(profile = %profile.name, error = %err, "skipping invalid profile");
                    false
                }
            })
            .map(BundledSite::from)
            .collect();
        info!(sites = sites.len(), total = profiles.len(), "bundle compiled");
        Self {
            format_version: BUNDLE_FORMAT_VERSION.to_string(),
            generated_at: Utc::now(),
            engine,
            heuristics: HeuristicTable::default(),
            sites,
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_userscript(&self) -> Result<String, EngineError> {
        // JSON is a JS literal apart from the two line separators
        let data = serde_json::to_string(self)?
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029");
        let mut script = String::with_capacity(RUNTIME.len() + data.len() + 512);
        script.push_str("// ==UserScript==\n");
        script.push_str("// @name         AutoLogin\n");
        script.push_str("// @namespace    http://autologin.local/\n");
        script.push_str(&format!("// @version      {}\n", self.format_version));
        script.push_str(&format!(
            "// @description  Automatic login for {} site(s), generated {}\n",
            self.sites.len(),
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        script.push_str("// @match        *://*/*\n");
        script.push_str("// @grant        none\n");
        script.push_str("// ==/UserScript==\n\n");
        script.push_str(&RUNTIME.replacen(BUNDLE_SLOT, &data, 1));
        Ok(script)
    }
}
