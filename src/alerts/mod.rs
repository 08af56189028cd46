//! Threshold, baseline and regression alerts.
//!
//! [`AlertEvaluator`] checks each snapshot, baseline comparison and regression
//! signal against its [`AlertRule`]s and raises at most one [`Alert`] per
//! (metric, rule) per cooldown interval.

mod evaluator;
mod rule;

pub use evaluator::{Alert, AlertEvaluator, AlertReference, AlertStats};
pub use rule::{default_rules, AlertRule, RuleKind, Severity};
