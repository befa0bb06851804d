//! Field assignment engine and declarative field validators.

mod assign;
mod validation;
pub use assign::*;
pub use validation::RuleValidator;
