use advisor_cli::config::AdvisorConfig;
use advisor_cli::{report, run};
use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  advisor [config.toml]    Evaluate the rules once and print the triggered ones");
    eprintln!("  advisor --help           Show this message");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("advisor=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/advisor.toml");
            run_advisor(config_path)
        }
    }
}

fn run_advisor(config_path: &str) -> Result<()> {
    let config = AdvisorConfig::load(config_path)?;
    tracing::info!(config = config_path, rules = %config.rules_path, "Starting advisor");

    let registry = run::load_registry(&config)?;
    let report = run::run_cycle(&config, &registry, Utc::now().timestamp())?;

    report::print(&registry, &report);
    if let Some(path) = &config.report_path {
        report.write_json(path)?;
    }
    Ok(())
}
