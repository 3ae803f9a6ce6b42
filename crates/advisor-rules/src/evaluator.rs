use crate::overlap::overlaps;
use crate::registry::Registry;
use crate::rule::Rule;
use crate::trigger::Triggers;
use advisor_common::types::Entity;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleState {
    Unevaluated,
    Triggered,
    NotTriggered,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unevaluated => write!(f, "unevaluated"),
            Self::Triggered => write!(f, "triggered"),
            Self::NotTriggered => write!(f, "not triggered"),
        }
    }
}

/// Verdict for one rule in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub state: RuleState,
    /// For overlap rules: whether each entity triggering both conditions
    /// saw them within the overlap window. Empty for plain rules.
    pub entity_overlaps: BTreeMap<Entity, bool>,
}

impl RuleOutcome {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            state: RuleState::Unevaluated,
            entity_overlaps: BTreeMap::new(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.state == RuleState::Triggered
    }
}

/// Combines the condition triggers of one cycle into rule verdicts.
pub struct RuleEvaluator<'a> {
    registry: &'a Registry,
    triggers: &'a Triggers,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(registry: &'a Registry, triggers: &'a Triggers) -> Self {
        Self { registry, triggers }
    }

    pub fn evaluate(&self, rule: &Rule) -> RuleOutcome {
        let mut outcome = RuleOutcome::new(&rule.name);
        let triggered = match rule.overlap_window_secs {
            None => rule.conditions.iter().all(|c| self.triggers.is_triggered(c)),
            Some(window) => self.evaluate_overlap(rule, window, &mut outcome.entity_overlaps),
        };
        outcome.state = if triggered {
            RuleState::Triggered
        } else {
            RuleState::NotTriggered
        };
        tracing::debug!(rule = %rule.name, state = %outcome.state, "Rule evaluated");
        outcome
    }

    fn evaluate_overlap(
        &self,
        rule: &Rule,
        window_secs: u64,
        verdicts: &mut BTreeMap<Entity, bool>,
    ) -> bool {
        let [first, second] = rule.conditions.as_slice() else {
            return false;
        };
        let (Some(a), Some(b)) = (self.triggers.get(first), self.triggers.get(second)) else {
            return false;
        };

        let b_entities = b.entities();
        for entity in a.entities() {
            if !b_entities.contains(&entity) {
                continue;
            }
            // aggregate triggers carry no epochs and never overlap
            let overlapped = match (a.epochs(entity), b.epochs(entity)) {
                (Some(ea), Some(eb)) => overlaps(&ea, &eb, window_secs),
                _ => false,
            };
            tracing::debug!(rule = %rule.name, entity, overlapped, "Overlap checked");
            verdicts.insert(entity.to_string(), overlapped);
        }
        verdicts.values().any(|v| *v)
    }

    /// Verdicts for every rule, in registry order.
    pub fn evaluate_all(&self) -> Vec<RuleOutcome> {
        let outcomes: Vec<RuleOutcome> = self
            .registry
            .rules()
            .iter()
            .map(|r| self.evaluate(r))
            .collect();
        tracing::info!(
            rules = outcomes.len(),
            triggered = outcomes.iter().filter(|o| o.is_triggered()).count(),
            "Rules evaluated"
        );
        outcomes
    }

    pub fn triggered_rules(&self) -> Vec<&'a Rule> {
        self.registry
            .rules()
            .iter()
            .filter(|r| self.evaluate(r).is_triggered())
            .collect()
    }
}
