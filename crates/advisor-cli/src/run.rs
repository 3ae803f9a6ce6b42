use crate::config::AdvisorConfig;
use crate::provider::JsonFileProvider;
use crate::report::Report;
use advisor_common::provider::{fetch_store, FetchRequest};
use advisor_common::types::Epoch;
use advisor_rules::engine::{required_statistics, trigger_conditions, ConditionEngine, DataSource};
use advisor_rules::options::OptionsSource;
use advisor_rules::registry::{Registry, RulesFile};
use advisor_rules::{DataSourceKind, RuleEvaluator};

/// Loads and validates the rules file, then substitutes the key prefix.
pub fn load_registry(config: &AdvisorConfig) -> anyhow::Result<Registry> {
    let path = &config.rules_path;
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read rules file '{}': {}", path, e))?;
    let file: RulesFile = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse rules file '{}': {}", path, e))?;
    let mut registry = Registry::from_file(&file)?;
    if let Some(prefix) = &config.key_prefix {
        registry.attach_prefix_to_keys(prefix);
    }
    let unprefixed = registry.unprefixed_keys();
    if !unprefixed.is_empty() {
        tracing::warn!(
            keys = ?unprefixed,
            "Statistic keys still carry the [] placeholder; set key_prefix"
        );
    }
    Ok(registry)
}

/// Runs one evaluation cycle: fetch, decide conditions, decide rules.
pub fn run_cycle(config: &AdvisorConfig, registry: &Registry, now: Epoch) -> anyhow::Result<Report> {
    let range = config.time_range(now);
    let request = FetchRequest {
        entities: config.entities.clone(),
        statistics: required_statistics(registry.conditions_for(DataSourceKind::Ods)),
        range,
    };

    let provider = JsonFileProvider::new(
        &config.samples_path,
        config.sampling_interval_secs,
        config.duration_secs,
    );
    let store = fetch_store(&provider, &request)?;
    let engine = ConditionEngine::new(store);
    let options = OptionsSource::new(config.options.clone());

    let sources: [&dyn DataSource; 2] = [&engine, &options];
    let triggers = trigger_conditions(&sources, registry);
    let outcomes = RuleEvaluator::new(registry, &triggers).evaluate_all();

    Ok(Report::build(registry, range, triggers, outcomes))
}
