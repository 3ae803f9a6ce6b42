use crate::burst::BurstMap;
use advisor_common::types::{Entity, Epoch};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-entity evidence that a condition held.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Burst windows: `entity -> epoch -> rate`.
    Bursts(BurstMap),
    /// Aggregated values that satisfied the expression, in key order.
    Values(BTreeMap<Entity, Vec<f64>>),
    /// Evidence recorded by an external scanner (e.g. matching log lines).
    Matches(BTreeMap<Entity, Vec<String>>),
}

impl Trigger {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bursts(m) => m.is_empty(),
            Self::Values(m) => m.is_empty(),
            Self::Matches(m) => m.is_empty(),
        }
    }

    pub fn entities(&self) -> Vec<&str> {
        match self {
            Self::Bursts(m) => m.keys().map(String::as_str).collect(),
            Self::Values(m) => m.keys().map(String::as_str).collect(),
            Self::Matches(m) => m.keys().map(String::as_str).collect(),
        }
    }

    /// Triggering epochs of `entity`. Only burst triggers carry epochs.
    pub fn epochs(&self, entity: &str) -> Option<Vec<Epoch>> {
        match self {
            Self::Bursts(m) => m.get(entity).map(|rates| rates.keys().copied().collect()),
            Self::Values(_) | Self::Matches(_) => None,
        }
    }
}

/// Trigger state of one evaluation cycle, keyed by condition name.
///
/// A condition without an entry did not trigger. Each cycle should start
/// from a fresh or [`Triggers::clear`]ed value so results never leak from
/// one cycle into the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Triggers {
    by_condition: BTreeMap<String, Trigger>,
}

impl Triggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the result for `condition`, replacing any earlier one.
    ///
    /// An empty trigger removes the entry, so re-evaluating a condition that
    /// no longer holds does not keep a stale result.
    pub fn record(&mut self, condition: &str, trigger: Trigger) {
        if trigger.is_empty() {
            self.by_condition.remove(condition);
        } else {
            self.by_condition.insert(condition.to_string(), trigger);
        }
    }

    pub fn reset(&mut self, condition: &str) {
        self.by_condition.remove(condition);
    }

    pub fn clear(&mut self) {
        self.by_condition.clear();
    }

    pub fn get(&self, condition: &str) -> Option<&Trigger> {
        self.by_condition.get(condition)
    }

    pub fn is_triggered(&self, condition: &str) -> bool {
        self.by_condition.contains_key(condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Trigger)> {
        self.by_condition.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.by_condition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_condition.is_empty()
    }
}
