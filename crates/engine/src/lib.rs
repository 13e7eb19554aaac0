//! Autofill engine
//!
//! Hosts the orchestration state machine that turns a session found in the
//! transport channel into a filled and submitted login form, plus the two
//! outward pieces built on the same configuration: the launcher and the
//! injectable bundle export.

pub mod bundle;
pub mod config;
pub mod errors;
pub mod events;
pub mod hooks;
pub mod launcher;
pub mod orchestrator;
pub mod state;

pub use bundle::{BundledSite, InjectableBundle, BUNDLE_FORMAT_VERSION};
pub use config::EngineConfig;
pub use errors::EngineError;
pub use events::{drain, EventHub, OrchestrationEvent, SubmitVia};
pub use hooks::LastUsedHook;
pub use launcher::launch_address;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use state::{FillStep, OrchestrationState, RunOutcome, RunReport};
