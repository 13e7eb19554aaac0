use std::path::PathBuf;

use anyhow::{Context, Result};
use autologin_engine::InjectableBundle;
use clap::{Args, ValueEnum};
use tokio::fs;
use tracing::info;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ExportArgs {
    /// Export format
    #[arg(short, long, default_value = "userscript")]
    pub format: ExportFormat,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExportFormat {
    /// Userscript with embedded profiles and runtime
    Userscript,
    /// Injectable bundle as JSON
    Bundle,
    /// Profile file in the `{version, exportDate, sites}` shape
    Config,
}

pub async fn cmd_export(args: ExportArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.profiles().await?;
    let rendered = match args.format {
        ExportFormat::Userscript => {
            InjectableBundle::compile(&store.sites(), ctx.config().engine.clone())
                .render_userscript()?
        }
        ExportFormat::Bundle => {
            InjectableBundle::compile(&store.sites(), ctx.config().engine.clone()).to_json()?
        }
        ExportFormat::Config => serde_json::to_string_pretty(&store.snapshot().exported())?,
    };

    match args.output {
        Some(path) => {
            fs::write(&path, rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), format = ?args.format, "Export written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
