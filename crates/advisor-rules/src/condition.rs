use crate::aggregate::AggregationOp;
use crate::expr::Expression;
use advisor_common::key;
use std::fmt;
use std::str::FromStr;

/// Where the evidence for a condition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataSourceKind {
    Log,
    Options,
    /// Time-series statistics.
    Ods,
}

impl FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOG" => Ok(Self::Log),
            "OPTIONS" => Ok(Self::Options),
            "ODS" => Ok(Self::Ods),
            _ => Err(format!("unknown condition source: {s}")),
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "LOG"),
            Self::Options => write!(f, "OPTIONS"),
            Self::Ods => write!(f, "ODS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope {
    Database,
    ColumnFamily,
}

impl FromStr for LogScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database" => Ok(Self::Database),
            "column_family" => Ok(Self::ColumnFamily),
            _ => Err(format!("unknown log scope: {s}")),
        }
    }
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::ColumnFamily => write!(f, "column_family"),
        }
    }
}

/// How a time-series condition analyses its statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Rate of change over a sliding window reaches `threshold` percent.
    Bursty { threshold: f64, window_secs: u64 },
    /// Aggregated values satisfy `expression`.
    EvaluateExpression {
        expression: Expression,
        aggregation: AggregationOp,
    },
}

impl Behavior {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bursty { .. } => "bursty",
            Self::EvaluateExpression { .. } => "evaluate_expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogCondition {
    pub regex: String,
    pub scope: LogScope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionsCondition {
    pub options: Vec<String>,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OdsCondition {
    /// Statistic keys in the order the expression binds them as `keys`.
    pub keys: Vec<String>,
    pub behavior: Behavior,
}

impl OdsCondition {
    /// Replaces the `[]` placeholder of every key with `prefix`.
    pub fn attach_prefix_to_keys(&mut self, prefix: &str) {
        self.keys = key::attach_prefix_all(&self.keys, prefix);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    Log(LogCondition),
    Options(OptionsCondition),
    Ods(OdsCondition),
}

/// A named, validated condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub kind: ConditionKind,
}

impl Condition {
    pub fn data_source(&self) -> DataSourceKind {
        match self.kind {
            ConditionKind::Log(_) => DataSourceKind::Log,
            ConditionKind::Options(_) => DataSourceKind::Options,
            ConditionKind::Ods(_) => DataSourceKind::Ods,
        }
    }

    pub fn as_ods(&self) -> Option<&OdsCondition> {
        match &self.kind {
            ConditionKind::Ods(ods) => Some(ods),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConditionKind::Log(log) => write!(
                f,
                "{} looks for the regex '{}' in the LOG file, scope {}",
                self.name, log.regex, log.scope
            ),
            ConditionKind::Options(opts) => write!(
                f,
                "{} evaluates '{}' over options {}",
                self.name,
                opts.expression,
                opts.options.join(", ")
            ),
            ConditionKind::Ods(ods) => write!(
                f,
                "{} is a {} ODS condition on {}",
                self.name,
                ods.behavior.name(),
                ods.keys.join(", ")
            ),
        }
    }
}
