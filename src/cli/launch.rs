use anyhow::Result;
use autologin_core_types::FlowKind;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::context::CliContext;
use super::output::emit;

#[derive(Args, Clone, Debug)]
pub struct LaunchArgs {
    /// Profile name or id
    pub profile: String,

    /// Leave the profile's lastUsed timestamp untouched
    #[arg(long)]
    pub no_touch: bool,
}

#[derive(Serialize)]
struct LaunchView {
    profile: String,
    flow: FlowKind,
    address: String,
}

pub async fn cmd_launch(args: LaunchArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.profiles().await?;
    let profile = store.get(&args.profile)?;
    let address = autologin_engine::launch_address(&profile)?;

    if !args.no_touch {
        store.touch(&profile.id.0, Utc::now())?;
        store.save().await?;
        info!(profile = %profile.name, "lastUsed updated");
    }

    let view = LaunchView {
        profile: profile.name,
        flow: profile.flow,
        address,
    };
    emit(ctx.output(), &view, |view| view.address.clone())
}
