use crate::engine::{trigger_conditions, ConditionEngine, DataSource};
use crate::evaluator::{RuleEvaluator, RuleState};
use crate::options::OptionsSource;
use crate::registry::{Registry, RulesFile};
use crate::trigger::{Trigger, Triggers};
use crate::ConfigError;
use advisor_common::store::TimeSeriesStore;
use std::collections::BTreeMap;

const RULES: &str = r#"
[[rules]]
name = "stall-with-write-burst"
conditions = ["stall-spike", "write-burst"]
suggestions = "inc-bg-flush"

[[rules]]
name = "stall-near-write-burst"
conditions = ["stall-burst", "write-burst"]
suggestions = ["inc-bg-flush", "inc-write-buffer"]
overlap_time_period = "2m"

[[rules]]
name = "few-memtables"
conditions = "small-buffer"
suggestions = "inc-write-buffer"

[[conditions]]
name = "stall-spike"
source = "ODS"
keys = "[]stall_micros"
behavior = "bursty"
threshold = 100
window = "1m"

[[conditions]]
name = "stall-burst"
source = "ODS"
keys = "[]stall_micros"
threshold = 100
window = "1m"

[[conditions]]
name = "write-burst"
source = "ODS"
keys = "[]writes_per_sec"
behavior = "bursty"
threshold = 50
window = "60s"

[[conditions]]
name = "small-buffer"
source = "OPTIONS"
options = ["max_write_buffer_number"]
evaluate = "keys[0] < 3"

[[conditions]]
name = "flush-errors"
source = "LOG"
regex = "flush failed"
scope = "column_family"

[[suggestions]]
name = "inc-bg-flush"
option = "DBOptions.max_background_flushes"
action = "set"
suggested_value = 2

[[suggestions]]
name = "inc-write-buffer"
option = "CFOptions.max_write_buffer_number"
action = "increase"
"#;

fn registry() -> Registry {
    let file: RulesFile = toml::from_str(RULES).unwrap();
    let mut registry = Registry::from_file(&file).unwrap();
    registry.attach_prefix_to_keys("rocksdb.");
    registry
}

fn store(samples: &[(&str, &str, i64, f64)]) -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new(60, 60).unwrap();
    for (entity, stat, ts, v) in samples {
        store.insert(entity, stat, *ts, *v);
    }
    store
}

#[test]
fn rules_file_loads_and_prefixes_keys() {
    let registry = registry();
    assert_eq!(registry.rules().len(), 3);
    assert_eq!(registry.conditions().count(), 5);

    let stall = registry.condition("stall-burst").unwrap().as_ods().unwrap();
    assert_eq!(stall.keys, vec!["rocksdb.stall_micros".to_string()]);

    let rule = registry.rule("stall-near-write-burst").unwrap();
    assert_eq!(rule.overlap_window_secs, Some(120));
    let (a, b) = registry.overlap_keys(rule).unwrap();
    assert_eq!(a, ["rocksdb.stall_micros".to_string()]);
    assert_eq!(b, ["rocksdb.writes_per_sec".to_string()]);
}

#[test]
fn placeholder_keys_reported_until_prefixed() {
    let file: RulesFile = toml::from_str(RULES).unwrap();
    let mut registry = Registry::from_file(&file).unwrap();
    assert_eq!(
        registry.unprefixed_keys(),
        vec!["[]stall_micros", "[]stall_micros", "[]writes_per_sec"]
    );
    registry.attach_prefix_to_keys("rocksdb.");
    assert!(registry.unprefixed_keys().is_empty());
}

#[test]
fn write_rate_spike_triggers_once_at_window_end() {
    let registry = registry();
    let engine = ConditionEngine::new(store(&[
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 500.0),
        ("db-01", "rocksdb.writes_per_sec", 120, 500.0),
    ]));

    let triggers = trigger_conditions(&[&engine], &registry);
    let Some(Trigger::Bursts(bursts)) = triggers.get("write-burst") else {
        panic!("write-burst should trigger");
    };
    let rates = &bursts["db-01"];
    assert_eq!(rates.len(), 1);
    // (500 - 10) * 100 / 10, per 60s duration over a 60s step
    assert_eq!(rates[&60], 4900.0);
}

#[test]
fn reset_triggers_stay_empty_without_data() {
    let registry = registry();
    let bursty = ConditionEngine::new(store(&[
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 500.0),
    ]));
    let mut triggers = trigger_conditions(&[&bursty], &registry);
    assert!(triggers.is_triggered("write-burst"));

    triggers.clear();
    let quiet = ConditionEngine::new(store(&[
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 10.0),
    ]));
    let conditions = registry.conditions_for(quiet.kind());
    quiet.check_and_trigger(&conditions, &mut triggers);
    assert!(triggers.is_empty());
}

#[test]
fn plain_rule_needs_every_condition() {
    let registry = registry();
    let rule = registry.rule("stall-with-write-burst").unwrap();

    let only_writes = ConditionEngine::new(store(&[
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 500.0),
    ]));
    let triggers = trigger_conditions(&[&only_writes], &registry);
    let outcome = RuleEvaluator::new(&registry, &triggers).evaluate(rule);
    assert_eq!(outcome.state, RuleState::NotTriggered);

    let both = ConditionEngine::new(store(&[
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 500.0),
        ("db-02", "rocksdb.stall_micros", 0, 1.0),
        ("db-02", "rocksdb.stall_micros", 60, 50.0),
    ]));
    let triggers = trigger_conditions(&[&both], &registry);
    let outcome = RuleEvaluator::new(&registry, &triggers).evaluate(rule);
    assert_eq!(outcome.state, RuleState::Triggered);
    assert!(outcome.entity_overlaps.is_empty());
}

#[test]
fn overlap_rule_correlates_per_entity() {
    let registry = registry();
    let rule = registry.rule("stall-near-write-burst").unwrap();
    let engine = ConditionEngine::new(store(&[
        // db-01: both bursts at 60
        ("db-01", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-01", "rocksdb.writes_per_sec", 60, 500.0),
        ("db-01", "rocksdb.stall_micros", 0, 1.0),
        ("db-01", "rocksdb.stall_micros", 60, 50.0),
        // db-02: writes burst at 60, stalls burst an hour later
        ("db-02", "rocksdb.writes_per_sec", 0, 10.0),
        ("db-02", "rocksdb.writes_per_sec", 60, 500.0),
        ("db-02", "rocksdb.stall_micros", 3540, 1.0),
        ("db-02", "rocksdb.stall_micros", 3600, 50.0),
    ]));

    let triggers = trigger_conditions(&[&engine], &registry);
    let outcome = RuleEvaluator::new(&registry, &triggers).evaluate(rule);
    assert_eq!(outcome.state, RuleState::Triggered);
    assert_eq!(
        outcome.entity_overlaps,
        BTreeMap::from([("db-01".to_string(), true), ("db-02".to_string(), false)])
    );
}

#[test]
fn sources_only_decide_their_own_conditions() {
    let registry = registry();
    let engine = ConditionEngine::new(store(&[]));
    let mut options = OptionsSource::default();
    options.set("default", "max_write_buffer_number", 2.0);

    let mut triggers = trigger_conditions(&[&engine, &options], &registry);
    assert!(triggers.is_triggered("small-buffer"));
    assert!(!triggers.is_triggered("flush-errors"));

    // log evidence comes from an external scanner
    triggers.record(
        "flush-errors",
        Trigger::Matches(BTreeMap::from([(
            "default".to_string(),
            vec!["flush failed: IO error".to_string()],
        )])),
    );
    assert!(triggers.is_triggered("flush-errors"));

    let evaluator = RuleEvaluator::new(&registry, &triggers);
    let names: Vec<&str> = evaluator
        .triggered_rules()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["few-memtables"]);
}

#[test]
fn overlap_rule_rejects_non_time_series_condition() {
    let text = RULES.replace(
        "conditions = [\"stall-burst\", \"write-burst\"]",
        "conditions = [\"stall-burst\", \"small-buffer\"]",
    );
    let file: RulesFile = toml::from_str(&text).unwrap();
    assert_eq!(
        Registry::from_file(&file).unwrap_err(),
        ConfigError::OverlapRequiresOds {
            rule: "stall-near-write-burst".into(),
            condition: "small-buffer".into(),
        }
    );
}

#[test]
fn oversized_overlap_window_is_fatal() {
    let text = RULES.replace(
        "overlap_time_period = \"2m\"",
        "overlap_time_period = \"5000000000000000000s\"",
    );
    let file: RulesFile = toml::from_str(&text).unwrap();
    assert!(matches!(
        Registry::from_file(&file),
        Err(ConfigError::InvalidTimeWindow { .. })
    ));
}

#[test]
fn undefined_suggestion_is_fatal() {
    let text = RULES.replace("suggestions = \"inc-bg-flush\"", "suggestions = \"missing\"");
    let file: RulesFile = toml::from_str(&text).unwrap();
    assert!(matches!(
        Registry::from_file(&file),
        Err(ConfigError::UndefinedSuggestion { .. })
    ));
}

#[test]
fn empty_triggers_trigger_nothing() {
    let triggers = Triggers::new();
    let registry = registry();
    let outcomes = RuleEvaluator::new(&registry, &triggers).evaluate_all();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.state == RuleState::NotTriggered));
}
