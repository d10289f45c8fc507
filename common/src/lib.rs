//! Shared configuration for the fraud scoring workspace
//!
//! This crate holds everything the executables read from disk before the
//! pipeline starts:
//!
//! - Connection settings and processor tuning (`config`)
//! - Indicator weights, risk thresholds and per-indicator parameters (`scoring`)
//! - YAML `!include` layering used to split large config files (`yaml_include`)

pub mod config;
pub mod scoring;
pub mod yaml_include;

pub use config::Config;
pub use scoring::ScoringConfig;
