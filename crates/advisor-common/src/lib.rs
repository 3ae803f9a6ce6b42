//! Shared data model for the advisor workspace: entity and sample types,
//! the per-cycle [`store::TimeSeriesStore`], statistic key prefixing and the
//! [`provider::SampleProvider`] contract implemented by fetchers.

pub mod error;
pub mod key;
pub mod provider;
pub mod store;
pub mod types;
