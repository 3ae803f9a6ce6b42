use crate::condition::{Condition, ConditionKind, DataSourceKind, OptionsCondition};
use crate::engine::DataSource;
use crate::error::EvalError;
use crate::trigger::{Trigger, Triggers};
use std::collections::BTreeMap;

/// `section -> option -> value`, as produced by an options-file parser.
pub type OptionMap = BTreeMap<String, BTreeMap<String, f64>>;

/// Decides OPTIONS conditions against already parsed configuration values.
///
/// Each section (e.g. one column family) is treated as an entity: the
/// condition's options are bound in order as `keys` and the section
/// triggers when the expression holds. Sections missing any of the options
/// are skipped.
#[derive(Debug, Clone, Default)]
pub struct OptionsSource {
    options: OptionMap,
}

impl OptionsSource {
    pub fn new(options: OptionMap) -> Self {
        Self { options }
    }

    pub fn set(&mut self, section: &str, option: &str, value: f64) {
        self.options
            .entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value);
    }

    pub fn evaluate(&self, name: &str, cond: &OptionsCondition) -> Trigger {
        let mut matched = BTreeMap::new();
        for (section, values) in &self.options {
            let bound: Option<Vec<f64>> = cond.options.iter().map(|o| values.get(o).copied()).collect();
            let Some(bound) = bound else {
                continue;
            };
            match cond.expression.evaluate(&bound) {
                Ok(true) => {
                    matched.insert(section.clone(), bound);
                }
                Ok(false) => {}
                Err(source) => {
                    let err = EvalError::Expression {
                        condition: name.to_string(),
                        entity: section.clone(),
                        source,
                    };
                    tracing::warn!(error = %err, "Options expression failed, section not triggered");
                }
            }
        }
        Trigger::Values(matched)
    }
}

impl DataSource for OptionsSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Options
    }

    fn check_and_trigger(&self, conditions: &[&Condition], triggers: &mut Triggers) {
        for cond in conditions {
            if let ConditionKind::Options(opts) = &cond.kind {
                triggers.record(&cond.name, self.evaluate(&cond.name, opts));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;

    #[test]
    fn sections_are_entities() {
        let mut source = OptionsSource::default();
        source.set("default", "max_write_buffer_number", 2.0);
        source.set("default", "min_write_buffer_number_to_merge", 1.0);
        source.set("users", "max_write_buffer_number", 6.0);
        source.set("users", "min_write_buffer_number_to_merge", 1.0);
        source.set("logs", "max_write_buffer_number", 1.0);

        let cond = Condition {
            name: "few-memtables".into(),
            kind: ConditionKind::Options(OptionsCondition {
                options: vec![
                    "max_write_buffer_number".into(),
                    "min_write_buffer_number_to_merge".into(),
                ],
                expression: Expression::parse("keys[0] - keys[1] < 2").unwrap(),
            }),
        };

        let mut triggers = Triggers::new();
        source.check_and_trigger(&[&cond], &mut triggers);
        let trigger = triggers.get("few-memtables").unwrap();
        assert_eq!(trigger.entities(), vec!["default"]);
    }
}
