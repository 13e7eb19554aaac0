use super::decode::cmd_decode;
use super::detect::cmd_detect;
use super::env::CliArgs;
use super::export::cmd_export;
use super::info::cmd_info;
use super::launch::cmd_launch;
use super::simulate::cmd_simulate;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Launch(args) => cmd_launch(args, ctx).await,
        Commands::Decode(args) => cmd_decode(args, ctx),
        Commands::Simulate(args) => cmd_simulate(args, ctx).await,
        Commands::Detect(args) => cmd_detect(args, ctx).await,
        Commands::Export(args) => cmd_export(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
