use advisor_common::types::TimeRange;
use advisor_rules::{Registry, RuleOutcome, Triggers};
use serde::Serialize;
use std::fmt::Write as _;

/// The two statistic series to chart side by side for an overlap rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartKeys {
    pub first: Vec<String>,
    pub second: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    #[serde(flatten)]
    pub outcome: RuleOutcome,
    pub suggestions: Vec<String>,
    pub chart_keys: Option<ChartKeys>,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub range: TimeRange,
    pub triggers: Triggers,
    pub rules: Vec<RuleReport>,
}

impl Report {
    pub fn build(
        registry: &Registry,
        range: TimeRange,
        triggers: Triggers,
        outcomes: Vec<RuleOutcome>,
    ) -> Self {
        let rules = outcomes
            .into_iter()
            .map(|outcome| {
                let rule = registry.rule(&outcome.rule);
                let suggestions: Vec<String> = rule
                    .map(|r| {
                        r.suggestions
                            .iter()
                            .filter_map(|name| registry.suggestion(name))
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let chart_keys = rule
                    .and_then(|r| registry.overlap_keys(r))
                    .map(|(first, second)| ChartKeys {
                        first: first.to_vec(),
                        second: second.to_vec(),
                    });
                RuleReport {
                    outcome,
                    suggestions,
                    chart_keys,
                }
            })
            .collect();
        Self {
            range,
            triggers,
            rules,
        }
    }

    pub fn triggered(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|r| r.outcome.is_triggered())
    }

    pub fn write_json(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write report '{}': {}", path, e))?;
        tracing::info!(path, "Report written");
        Ok(())
    }
}

/// The loaded rules, conditions and suggestions, one per line.
pub fn render_listing(registry: &Registry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RULES");
    for rule in registry.rules() {
        let _ = writeln!(out, "{rule}");
    }
    let _ = writeln!(out, "CONDITIONS");
    for cond in registry.conditions() {
        let _ = writeln!(out, "{cond}");
    }
    let _ = writeln!(out, "SUGGESTIONS");
    for sugg in registry.suggestions() {
        let _ = writeln!(out, "{sugg}");
    }
    out
}

pub fn render_triggered(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TRIGGERED RULES {}", report.range);
    let mut any = false;
    for rule in report.triggered() {
        any = true;
        let _ = writeln!(out, "Rule: {}", rule.outcome.rule);
        for sugg in &rule.suggestions {
            let _ = writeln!(out, "  {sugg}");
        }
        if let Some(keys) = &rule.chart_keys {
            let _ = writeln!(
                out,
                "  chart: {} vs {}",
                keys.first.join(", "),
                keys.second.join(", ")
            );
            for (entity, overlapped) in &rule.outcome.entity_overlaps {
                if *overlapped {
                    let _ = writeln!(out, "  overlap on {entity}");
                }
            }
        }
    }
    if !any {
        let _ = writeln!(out, "No rules triggered");
    }
    out
}

#[allow(clippy::print_stdout)]
pub fn print(registry: &Registry, report: &Report) {
    print!("{}", render_listing(registry));
    println!();
    print!("{}", render_triggered(report));
}
