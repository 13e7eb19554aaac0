use clap::Subcommand;

use super::decode::DecodeArgs;
use super::detect::DetectArgs;
use super::export::ExportArgs;
use super::launch::LaunchArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Print the launch address that opens a site with its session armed
    Launch(LaunchArgs),

    /// Inspect the session carried by an address (secret redacted)
    Decode(DecodeArgs),

    /// Run the autofill engine against page fixtures
    Simulate(SimulateArgs),

    /// Capture a field selector by replaying gestures on a page fixture
    Detect(DetectArgs),

    /// Export profiles as a userscript, an injectable bundle or a config file
    Export(ExportArgs),

    /// Show build information and the effective configuration
    Info,
}
