use crate::aggregate::{aggregate, AggregationOp};
use crate::burst::detect_bursts;
use crate::condition::{Behavior, Condition, DataSourceKind, OdsCondition};
use crate::error::EvalError;
use crate::expr::Expression;
use crate::registry::Registry;
use crate::trigger::{Trigger, Triggers};
use advisor_common::store::TimeSeriesStore;
use std::collections::BTreeMap;

/// A source of evidence able to decide the conditions that name it.
pub trait DataSource {
    fn kind(&self) -> DataSourceKind;

    /// Evaluates `conditions` and records each result in `triggers`.
    ///
    /// Conditions of another kind are ignored. A condition that cannot be
    /// evaluated is logged and recorded as not triggered.
    fn check_and_trigger(&self, conditions: &[&Condition], triggers: &mut Triggers);
}

/// Decides time-series conditions against one materialized
/// [`TimeSeriesStore`].
pub struct ConditionEngine {
    store: TimeSeriesStore,
}

impl ConditionEngine {
    pub fn new(store: TimeSeriesStore) -> Self {
        Self { store }
    }

    /// Evaluates one ODS condition. An empty trigger means the condition did
    /// not hold for any entity.
    pub fn evaluate(&self, name: &str, cond: &OdsCondition) -> Result<Trigger, EvalError> {
        match &cond.behavior {
            Behavior::Bursty {
                threshold,
                window_secs,
            } => Ok(self.evaluate_bursty(cond, *threshold, *window_secs)),
            Behavior::EvaluateExpression {
                expression,
                aggregation,
            } => self.evaluate_aggregate(name, cond, expression, *aggregation),
        }
    }

    fn evaluate_bursty(&self, cond: &OdsCondition, threshold: f64, window_secs: u64) -> Trigger {
        // bursty conditions are validated to carry exactly one key
        let Some(statistic) = cond.keys.first() else {
            return Trigger::Bursts(Default::default());
        };
        Trigger::Bursts(detect_bursts(
            &self.store,
            statistic,
            window_secs,
            threshold,
            true,
        ))
    }

    fn evaluate_aggregate(
        &self,
        name: &str,
        cond: &OdsCondition,
        expression: &Expression,
        op: AggregationOp,
    ) -> Result<Trigger, EvalError> {
        let aggregated =
            aggregate(self.store.data(), &cond.keys, op).map_err(|source| EvalError::Data {
                condition: name.to_string(),
                source,
            })?;

        let mut matched = BTreeMap::new();
        for (entity, stats) in &aggregated {
            let values: Option<Vec<f64>> = cond.keys.iter().map(|k| stats.get(k).copied()).collect();
            let Some(values) = values else {
                tracing::debug!(condition = %name, entity = %entity, "Entity lacks some keys, skipped");
                continue;
            };

            match expression.evaluate(&values) {
                Ok(true) => {
                    matched.insert(entity.clone(), values);
                }
                Ok(false) => {
                    tracing::debug!(condition = %name, entity = %entity, "Expression is false");
                }
                Err(source) => {
                    let err = EvalError::Expression {
                        condition: name.to_string(),
                        entity: entity.clone(),
                        source,
                    };
                    tracing::warn!(error = %err, expression = %expression, "Expression failed, entity not triggered");
                }
            }
        }
        Ok(Trigger::Values(matched))
    }
}

impl DataSource for ConditionEngine {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Ods
    }

    fn check_and_trigger(&self, conditions: &[&Condition], triggers: &mut Triggers) {
        for cond in conditions {
            let Some(ods) = cond.as_ods() else {
                continue;
            };
            match self.evaluate(&cond.name, ods) {
                Ok(trigger) => {
                    if !trigger.is_empty() {
                        tracing::debug!(
                            condition = %cond.name,
                            entities = trigger.entities().len(),
                            "Condition triggered"
                        );
                    }
                    triggers.record(&cond.name, trigger);
                }
                Err(e) => {
                    tracing::warn!(condition = %cond.name, error = %e, "Skipping condition");
                    triggers.reset(&cond.name);
                }
            }
        }
    }
}

/// Unique statistic keys needed by the ODS conditions in `conditions`, in
/// first-use order.
pub fn required_statistics<'a>(conditions: impl IntoIterator<Item = &'a Condition>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for ods in conditions.into_iter().filter_map(Condition::as_ods) {
        for key in &ods.keys {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

/// Runs every data source over the registry's conditions of its kind and
/// returns the triggers of this cycle.
pub fn trigger_conditions(sources: &[&dyn DataSource], registry: &Registry) -> Triggers {
    let mut triggers = Triggers::new();
    for source in sources {
        let conditions = registry.conditions_for(source.kind());
        source.check_and_trigger(&conditions, &mut triggers);
    }
    tracing::info!(
        sources = sources.len(),
        triggered = triggers.len(),
        "Conditions evaluated"
    );
    triggers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionKind;

    fn store() -> TimeSeriesStore {
        let mut store = TimeSeriesStore::new(60, 60).unwrap();
        for (ts, v) in [(0, 100.0), (60, 100.0), (120, 300.0)] {
            store.insert("db-01", "writes", ts, v);
        }
        store.insert("db-01", "flushes", 0, 4.0);
        store.insert("db-01", "compactions", 0, 1.0);
        store.insert("db-02", "flushes", 0, 1.0);
        store.insert("db-02", "compactions", 0, 3.0);
        // db-03 lacks "compactions"
        store.insert("db-03", "flushes", 0, 10.0);
        store
    }

    fn aggregate_cond(name: &str, expr: &str) -> Condition {
        Condition {
            name: name.into(),
            kind: ConditionKind::Ods(OdsCondition {
                keys: vec!["flushes".into(), "compactions".into()],
                behavior: Behavior::EvaluateExpression {
                    expression: Expression::parse(expr).unwrap(),
                    aggregation: AggregationOp::Avg,
                },
            }),
        }
    }

    #[test]
    fn bursty_records_triggering_epochs() {
        let engine = ConditionEngine::new(store());
        let cond = Condition {
            name: "write-burst".into(),
            kind: ConditionKind::Ods(OdsCondition {
                keys: vec!["writes".into()],
                behavior: Behavior::Bursty {
                    threshold: 100.0,
                    window_secs: 60,
                },
            }),
        };
        let mut triggers = Triggers::new();
        engine.check_and_trigger(&[&cond], &mut triggers);

        let trigger = triggers.get("write-burst").unwrap();
        assert_eq!(trigger.epochs("db-01"), Some(vec![120]));
    }

    #[test]
    fn aggregate_keeps_key_order_and_skips_partial_entities() {
        let engine = ConditionEngine::new(store());
        let cond = aggregate_cond("flush-heavy", "keys[0] > keys[1]");
        let trigger = engine.evaluate(&cond.name, cond.as_ods().unwrap()).unwrap();

        let Trigger::Values(values) = trigger else {
            panic!("expected values trigger");
        };
        assert_eq!(values.len(), 1);
        assert_eq!(values["db-01"], vec![4.0, 1.0]);
    }

    #[test]
    fn failing_expression_does_not_trigger() {
        let engine = ConditionEngine::new(store());
        let cond = aggregate_cond("broken", "keys[5] > 0");
        let mut triggers = Triggers::new();
        engine.check_and_trigger(&[&cond], &mut triggers);
        assert!(!triggers.is_triggered("broken"));
    }

    #[test]
    fn required_statistics_are_unique() {
        let a = aggregate_cond("a", "true");
        let b = aggregate_cond("b", "true");
        assert_eq!(
            required_statistics([&a, &b]),
            vec!["flushes".to_string(), "compactions".to_string()]
        );
    }
}
