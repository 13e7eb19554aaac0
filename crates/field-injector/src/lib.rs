//! Field injection
//!
//! Types a value into a resolved element one character at a time and fires the
//! event set reactive UI frameworks listen for:
//!
//! 1. `focus`, then the value is cleared
//! 2. per character: append to the value, `input`, `keyup`
//! 3. `change`, `blur`
//!
//! Liveness is checked before every emission; a detached element stops the
//! sequence and is reported as [`InjectOutcome::Detached`].

pub mod errors;
pub mod injector;
pub mod model;
pub mod tempo;

pub use errors::InjectError;
pub use injector::{click, press_enter, FieldInjector};
pub use model::{ActionOutcome, InjectOutcome, InjectReport};
pub use tempo::{FixedTempo, Tempo, TypingPlan, TypingStep};
