//! AutoLogin library
//!
//! Exposes the CLI, configuration and profile store for integration testing

pub mod cli;
pub mod config;
pub mod profiles;
pub mod simulate;

pub use config::AppConfig;
pub use profiles::{ProfileError, ProfileFile, ProfileStore};
pub use simulate::{simulate, PageRun, SimulationReport};
