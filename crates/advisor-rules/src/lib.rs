//! Condition and rule evaluation engine.
//!
//! A [`registry::Registry`] holds the validated rules, conditions and
//! suggestions of a rules file. Each cycle, every [`engine::DataSource`]
//! decides the conditions of its kind and records the evidence in a
//! [`trigger::Triggers`] value, which the [`evaluator::RuleEvaluator`] then
//! folds into per-rule verdicts. Time-series conditions are decided by the
//! [`engine::ConditionEngine`] through burst detection or aggregation
//! followed by a restricted boolean expression.

pub mod aggregate;
pub mod burst;
pub mod condition;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod options;
pub mod overlap;
pub mod registry;
pub mod rule;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use condition::{Condition, DataSourceKind};
pub use engine::{ConditionEngine, DataSource};
pub use error::{ConfigError, EvalError};
pub use evaluator::{RuleEvaluator, RuleOutcome, RuleState};
pub use registry::Registry;
pub use rule::{Rule, Suggestion};
pub use trigger::{Trigger, Triggers};
