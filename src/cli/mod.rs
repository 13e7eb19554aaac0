pub mod app;
pub mod commands;
pub mod context;
pub mod decode;
pub mod detect;
pub mod dispatch;
pub mod env;
pub mod export;
pub mod info;
pub mod launch;
pub mod output;
pub mod runtime;
pub mod simulate;

pub use app::run;
pub use output::OutputFormat;
