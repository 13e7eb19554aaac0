use anyhow::{Context, Result};
use autologin_core_types::{FlowKind, SelectorOverrides};
use clap::Args;
use serde::Serialize;

use super::context::CliContext;
use super::output::emit;

#[derive(Args, Clone, Debug)]
pub struct DecodeArgs {
    /// Address with a session fragment, or the bare fragment
    pub address: String,

    /// Print the secret instead of masking it
    #[arg(long)]
    pub reveal: bool,
}

#[derive(Serialize)]
struct SessionView {
    identity: String,
    secret: String,
    flow: FlowKind,
    overrides: SelectorOverrides,
}

pub fn cmd_decode(args: DecodeArgs, ctx: &CliContext) -> Result<()> {
    let fragment = autologin_transport::fragment_of(&args.address).unwrap_or(&args.address);
    let payload =
        autologin_transport::try_decode(fragment).context("Address carries no usable session")?;

    let secret = if args.reveal {
        payload.secret.clone()
    } else {
        "*".repeat(payload.secret.chars().count())
    };
    let view = SessionView {
        identity: payload.identity.clone(),
        secret,
        flow: payload.flow,
        overrides: payload.overrides.clone(),
    };
    emit(ctx.output(), &view, |view| {
        let mut lines = vec![
            format!("identity: {}", view.identity),
            format!("secret:   {}", view.secret),
            format!("flow:     {}", view.flow),
        ];
        for (label, selector) in [
            ("username selector", &view.overrides.username),
            ("password selector", &view.overrides.password),
            ("submit selector", &view.overrides.submit),
        ] {
            if let Some(selector) = selector {
                lines.push(format!("{label}: {selector}"));
            }
        }
        lines.join("\n")
    })
}
