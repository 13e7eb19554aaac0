use anyhow::Result;
use autologin_detector::DetectorConfig;
use autologin_engine::EngineConfig;
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;

#[derive(Serialize)]
struct InfoView {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    config_path: String,
    profiles_path: Option<String>,
    profiles: Option<ProfileCounts>,
    engine: EngineConfig,
    detector: DetectorConfig,
}

#[derive(Serialize)]
struct ProfileCounts {
    total: usize,
    enabled: usize,
}

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let profiles = match ctx.profiles().await {
        Ok(store) => {
            let sites = store.sites();
            Some(ProfileCounts {
                total: sites.len(),
                enabled: sites.iter().filter(|site| site.enabled).count(),
            })
        }
        Err(_) => None,
    };

    let view = InfoView {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_commit: env!("GIT_HASH"),
        config_path: ctx.config_path().display().to_string(),
        profiles_path: ctx.profiles_path().map(|p| p.display().to_string()),
        profiles,
        engine: ctx.config().engine.clone(),
        detector: ctx.config().detector.clone(),
    };

    emit(ctx.output(), &view, |view| {
        let mut out = String::new();
        out.push_str("AutoLogin System Information\n");
        out.push_str("============================\n");
        out.push_str(&format!("Version: {}\n", view.version));
        out.push_str(&format!("Build Date: {}\n", view.build_date));
        out.push_str(&format!("Git Commit: {}\n\n", view.git_commit));
        out.push_str("Configuration:\n");
        out.push_str(&format!("- Config File: {}\n", view.config_path));
        out.push_str(&format!(
            "- Profile File: {}\n",
            view.profiles_path.as_deref().unwrap_or("(none)")
        ));
        if let Some(counts) = &view.profiles {
            out.push_str(&format!(
                "- Profiles: {} ({} enabled)\n",
                counts.total, counts.enabled
            ));
        }
        out.push_str(&format!(
            "- Polling: every {} ms, {} attempts\n",
            view.engine.poll_interval_ms, view.engine.max_attempts
        ));
        out.push_str(&format!("- Keystroke Delay: {} ms\n", view.engine.keystroke_delay_ms));
        out.push_str(&format!("- Detector Timeout: {} ms\n", view.detector.timeout_ms));
        out
    })
}
