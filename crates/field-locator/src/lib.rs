//! Field locator - resolves login form elements
//!
//! Resolution order for each field kind:
//! 1. Explicit selector override, when it hits a usable element
//! 2. Ordered heuristic predicates; first predicate with a usable match wins,
//!    ties go to document order

pub mod heuristics;
pub mod resolver;

pub use heuristics::{HeuristicTable, Predicate};
pub use resolver::{FieldResolver, FieldSet, HeuristicResolver, Resolution, ResolutionSource};
