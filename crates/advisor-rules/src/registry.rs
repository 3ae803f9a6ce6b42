use crate::aggregate::AggregationOp;
use crate::condition::{
    Behavior, Condition, ConditionKind, DataSourceKind, LogCondition, LogScope, OdsCondition,
    OptionsCondition,
};
use crate::error::{ConfigError, Result};
use crate::expr::Expression;
use crate::rule::{Rule, Suggestion, SuggestionAction, SuggestionBody};
use advisor_common::key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---- Rules file schema ----

/// Top-level layout of a rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionDef>,
}

/// A field that may hold a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// A scalar suggestion value, kept as text once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarDef {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for ScalarDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub conditions: Option<OneOrMany>,
    pub suggestions: Option<OneOrMany>,
    /// `<number>[s|m|h|d]`, e.g. `"10m"`.
    pub overlap_time_period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    pub name: String,
    /// `LOG`, `OPTIONS` or `ODS`.
    pub source: Option<String>,
    // LOG
    pub regex: Option<String>,
    pub scope: Option<String>,
    // OPTIONS
    pub options: Option<OneOrMany>,
    // OPTIONS and ODS
    pub evaluate: Option<String>,
    // ODS
    pub keys: Option<OneOrMany>,
    pub behavior: Option<String>,
    pub threshold: Option<f64>,
    pub window: Option<String>,
    pub aggregation_op: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionDef {
    pub name: String,
    pub option: Option<String>,
    pub action: Option<String>,
    pub suggested_value: Option<ScalarDef>,
    pub description: Option<String>,
}

fn default_burst_window() -> &'static str {
    "15m"
}

fn default_aggregation_op() -> AggregationOp {
    AggregationOp::Avg
}

// ---- Definition -> validated model ----

/// Largest accepted window. Overlap checks add twice the window to an epoch.
pub const MAX_TIME_WINDOW_SECS: u64 = (i64::MAX / 4) as u64;

/// Parses `<number>[s|m|h|d]` (case-insensitive) into seconds.
pub fn parse_time_window(owner: &str, value: &str) -> Result<u64> {
    let invalid = || ConfigError::InvalidTimeWindow {
        owner: owner.to_string(),
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let digits = &trimmed[..trimmed.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let count: u64 = digits.parse().map_err(|_| invalid())?;
    let factor = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    count
        .checked_mul(factor)
        .filter(|secs| *secs <= MAX_TIME_WINDOW_SECS)
        .ok_or_else(invalid)
}

fn parse_expression(name: &str, source: &str) -> Result<Expression> {
    Expression::parse(source).map_err(|e| ConfigError::Expression {
        name: name.to_string(),
        source: e,
    })
}

fn parse_field<T: std::str::FromStr<Err = String>>(
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<T> {
    value.parse().map_err(|message| ConfigError::InvalidField {
        name: name.to_string(),
        field,
        message,
    })
}

fn required<T>(name: &str, field: &'static str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ConfigError::MissingField {
        name: name.to_string(),
        field,
    })
}

/// Converts one condition definition into a [`Condition`].
pub fn build_condition(def: &ConditionDef) -> Result<Condition> {
    let name = def.name.as_str();
    let source = required(name, "source", def.source.as_deref())?;
    let source: DataSourceKind = parse_field(name, "source", source)?;

    let kind = match source {
        DataSourceKind::Log => {
            let regex = required(name, "regex", def.regex.clone())?;
            let scope = match def.scope.as_deref() {
                Some(s) => parse_field(name, "scope", s)?,
                None => LogScope::Database,
            };
            ConditionKind::Log(LogCondition { regex, scope })
        }
        DataSourceKind::Options => {
            let options = required(name, "options", def.options.clone())?.into_vec();
            if options.is_empty() {
                return Err(ConfigError::MissingField {
                    name: name.to_string(),
                    field: "options",
                });
            }
            let source = required(name, "evaluate", def.evaluate.as_deref())?;
            ConditionKind::Options(OptionsCondition {
                options,
                expression: parse_expression(name, source)?,
            })
        }
        DataSourceKind::Ods => ConditionKind::Ods(build_ods_condition(def)?),
    };

    Ok(Condition {
        name: def.name.clone(),
        kind,
    })
}

fn build_ods_condition(def: &ConditionDef) -> Result<OdsCondition> {
    let name = def.name.as_str();
    let keys = required(name, "keys", def.keys.clone())?.into_vec();
    if keys.is_empty() {
        return Err(ConfigError::MissingField {
            name: name.to_string(),
            field: "keys",
        });
    }

    // without an explicit behavior, the fields that are present decide
    let behavior = match def.behavior.as_deref() {
        Some(b) => b,
        None if def.threshold.is_some() => "bursty",
        None if def.evaluate.is_some() => "evaluate_expression",
        None => {
            return Err(ConfigError::MissingField {
                name: name.to_string(),
                field: "behavior",
            })
        }
    };

    let behavior = match behavior {
        "bursty" => {
            if keys.len() != 1 {
                return Err(ConfigError::SingleKeyRequired {
                    name: name.to_string(),
                    count: keys.len(),
                });
            }
            let threshold = required(name, "threshold", def.threshold)?;
            let window = def.window.as_deref().unwrap_or(default_burst_window());
            Behavior::Bursty {
                threshold,
                window_secs: parse_time_window(name, window)?,
            }
        }
        "evaluate_expression" => {
            let source = required(name, "evaluate", def.evaluate.as_deref())?;
            let aggregation = match def.aggregation_op.as_deref() {
                Some(op) => parse_field(name, "aggregation_op", op)?,
                None => default_aggregation_op(),
            };
            Behavior::EvaluateExpression {
                expression: parse_expression(name, source)?,
                aggregation,
            }
        }
        other => {
            return Err(ConfigError::InvalidField {
                name: name.to_string(),
                field: "behavior",
                message: format!("unknown behavior: {other}"),
            })
        }
    };

    Ok(OdsCondition { keys, behavior })
}

/// Converts one suggestion definition into a [`Suggestion`].
pub fn build_suggestion(def: &SuggestionDef) -> Result<Suggestion> {
    let name = def.name.as_str();
    if let Some(text) = def.description.as_ref().filter(|d| !d.is_empty()) {
        return Ok(Suggestion {
            name: def.name.clone(),
            body: SuggestionBody::Description(text.clone()),
        });
    }

    let option = required(name, "option", def.option.clone())?;
    let action = required(name, "action", def.action.as_deref())?;
    let action: SuggestionAction = parse_field(name, "action", action)?;
    let suggested_value = def.suggested_value.as_ref().map(ToString::to_string);
    if action == SuggestionAction::Set && suggested_value.is_none() {
        return Err(ConfigError::MissingField {
            name: name.to_string(),
            field: "suggested_value",
        });
    }

    Ok(Suggestion {
        name: def.name.clone(),
        body: SuggestionBody::Change {
            option,
            action,
            suggested_value,
        },
    })
}

/// Converts one rule definition into a [`Rule`]. References to conditions
/// and suggestions are checked by [`Registry::new`].
pub fn build_rule(def: &RuleDef) -> Result<Rule> {
    let conditions = def.conditions.clone().map(OneOrMany::into_vec).unwrap_or_default();
    if conditions.is_empty() {
        return Err(ConfigError::MissingConditions(def.name.clone()));
    }
    let suggestions = def.suggestions.clone().map(OneOrMany::into_vec).unwrap_or_default();
    if suggestions.is_empty() {
        return Err(ConfigError::MissingSuggestions(def.name.clone()));
    }

    let overlap_window_secs = match def.overlap_time_period.as_deref() {
        Some(period) => {
            if conditions.len() != 2 {
                return Err(ConfigError::OverlapConditionCount {
                    rule: def.name.clone(),
                    count: conditions.len(),
                });
            }
            Some(parse_time_window(&def.name, period)?)
        }
        None => None,
    };

    Ok(Rule {
        name: def.name.clone(),
        conditions,
        suggestions,
        overlap_window_secs,
    })
}

// ---- Registry ----

/// The validated set of rules, conditions and suggestions of one rules file.
///
/// Every rule references defined conditions and suggestions, and every
/// overlap rule references exactly two ODS conditions. All three sections
/// keep their file order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    rules: Vec<Rule>,
    conditions: Vec<Condition>,
    suggestions: Vec<Suggestion>,
    condition_index: BTreeMap<String, usize>,
    suggestion_index: BTreeMap<String, usize>,
}

/// Maps each name to its position, rejecting duplicates.
fn index_names<'a>(
    section: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<BTreeMap<String, usize>> {
    let mut index = BTreeMap::new();
    for (ix, name) in names.enumerate() {
        if index.insert(name.to_string(), ix).is_some() {
            return Err(ConfigError::Duplicate {
                section,
                name: name.to_string(),
            });
        }
    }
    Ok(index)
}

impl Registry {
    /// Builds a registry from already constructed parts, checking every
    /// cross reference.
    pub fn new(
        rules: Vec<Rule>,
        conditions: Vec<Condition>,
        suggestions: Vec<Suggestion>,
    ) -> Result<Self> {
        let condition_index = index_names("condition", conditions.iter().map(|c| c.name.as_str()))?;
        let suggestion_index =
            index_names("suggestion", suggestions.iter().map(|s| s.name.as_str()))?;
        index_names("rule", rules.iter().map(|r| r.name.as_str()))?;

        let registry = Self {
            rules,
            conditions,
            suggestions,
            condition_index,
            suggestion_index,
        };
        for rule in &registry.rules {
            registry.check_rule_references(rule)?;
        }
        Ok(registry)
    }

    /// Builds and validates every section of a rules file.
    pub fn from_file(file: &RulesFile) -> Result<Self> {
        let conditions = file
            .conditions
            .iter()
            .map(build_condition)
            .collect::<Result<Vec<_>>>()?;
        let suggestions = file
            .suggestions
            .iter()
            .map(build_suggestion)
            .collect::<Result<Vec<_>>>()?;
        let rules = file.rules.iter().map(build_rule).collect::<Result<Vec<_>>>()?;

        let registry = Self::new(rules, conditions, suggestions)?;
        tracing::info!(
            rules = registry.rules.len(),
            conditions = registry.conditions.len(),
            suggestions = registry.suggestions.len(),
            "Rules loaded"
        );
        Ok(registry)
    }

    fn check_rule_references(&self, rule: &Rule) -> Result<()> {
        for name in &rule.conditions {
            let cond = self
                .condition(name)
                .ok_or_else(|| ConfigError::UndefinedCondition {
                    rule: rule.name.clone(),
                    condition: name.clone(),
                })?;
            if rule.overlap_window_secs.is_some() && cond.data_source() != DataSourceKind::Ods {
                return Err(ConfigError::OverlapRequiresOds {
                    rule: rule.name.clone(),
                    condition: name.clone(),
                });
            }
        }
        for name in &rule.suggestions {
            if self.suggestion(name).is_none() {
                return Err(ConfigError::UndefinedSuggestion {
                    rule: rule.name.clone(),
                    suggestion: name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.condition_index.get(name).map(|ix| &self.conditions[*ix])
    }

    pub fn suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter()
    }

    pub fn suggestion(&self, name: &str) -> Option<&Suggestion> {
        self.suggestion_index.get(name).map(|ix| &self.suggestions[*ix])
    }

    /// Conditions whose evidence comes from `kind`.
    pub fn conditions_for(&self, kind: DataSourceKind) -> Vec<&Condition> {
        self.conditions
            .iter()
            .filter(|c| c.data_source() == kind)
            .collect()
    }

    /// Substitutes the key placeholder of every ODS condition.
    pub fn attach_prefix_to_keys(&mut self, prefix: &str) {
        for cond in &mut self.conditions {
            if let ConditionKind::Ods(ods) = &mut cond.kind {
                ods.attach_prefix_to_keys(prefix);
            }
        }
    }

    /// ODS keys that still carry the `[]` placeholder, i.e. that no prefix
    /// was attached to.
    pub fn unprefixed_keys(&self) -> Vec<&str> {
        self.conditions()
            .filter_map(Condition::as_ods)
            .flat_map(|ods| ods.keys.iter())
            .filter(|k| key::has_placeholder(k))
            .map(String::as_str)
            .collect()
    }

    /// The statistic keys of the two conditions of an overlap rule, for
    /// building a chart of both series.
    pub fn overlap_keys(&self, rule: &Rule) -> Option<(&[String], &[String])> {
        rule.overlap_window_secs?;
        let first = self.condition(rule.conditions.first()?)?.as_ods()?;
        let second = self.condition(rule.conditions.get(1)?)?.as_ods()?;
        Some((&first.keys, &second.keys))
    }
}
