//! Command-line surface of the advisor: configuration, a JSON sample
//! provider, one-shot cycle execution and reporting.

pub mod config;
pub mod provider;
pub mod report;
pub mod run;
