use crate::expr::ExprError;
use advisor_common::error::DataError;

/// Fatal problems in a rules file, reported before any evaluation.
///
/// # Examples
///
/// ```rust
/// use advisor_rules::error::ConfigError;
///
/// let err = ConfigError::MissingSuggestions("stall".to_string());
/// assert!(err.to_string().contains("stall"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Rules: {0}: rule must have at least one condition")]
    MissingConditions(String),

    #[error("Rules: {0}: rule must have at least one suggestion")]
    MissingSuggestions(String),

    #[error("Rules: {rule}: an overlap window needs exactly 2 conditions, found {count}")]
    OverlapConditionCount { rule: String, count: usize },

    #[error("Rules: {rule}: overlap condition '{condition}' is not an ODS condition")]
    OverlapRequiresOds { rule: String, condition: String },

    #[error("Rules: {owner}: invalid time window '{value}', expected <number>[s|m|h|d]")]
    InvalidTimeWindow { owner: String, value: String },

    #[error("Rules: {rule}: undefined condition '{condition}'")]
    UndefinedCondition { rule: String, condition: String },

    #[error("Rules: {rule}: undefined suggestion '{suggestion}'")]
    UndefinedSuggestion { rule: String, suggestion: String },

    #[error("Rules: duplicate {section} '{name}'")]
    Duplicate { section: &'static str, name: String },

    #[error("Rules: {name}: missing field '{field}'")]
    MissingField { name: String, field: &'static str },

    #[error("Rules: {name}: invalid {field}: {message}")]
    InvalidField {
        name: String,
        field: &'static str,
        message: String,
    },

    #[error("Rules: {name}: bursty conditions take exactly one key, found {count}")]
    SingleKeyRequired { name: String, count: usize },

    #[error("Rules: {name}: invalid expression: {source}")]
    Expression {
        name: String,
        #[source]
        source: ExprError,
    },
}

/// Failure while evaluating one condition against one data source.
///
/// Evaluation errors never abort a cycle: the engine logs them and treats
/// the affected condition or entity as not triggered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("condition {condition}: {source}")]
    Data {
        condition: String,
        #[source]
        source: DataError,
    },

    #[error("condition {condition}, entity {entity}: {source}")]
    Expression {
        condition: String,
        entity: String,
        #[source]
        source: ExprError,
    },
}

/// Convenience `Result` alias for rule loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
