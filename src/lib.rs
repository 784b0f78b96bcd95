//! Headless, config-driven load generator for the third-party ordering (TPO)
//! gateway.
//!
//! A run is declared entirely in the config file: which gateway deployment to
//! aim at, which task families to weight, and the rps stages to ramp through.
//! The runner resizes a pool of zero-think-time workers so the offered load
//! follows the staged curve, while stats roll up to the console and the
//! optional status API.

#[cfg(feature = "web")]
pub mod api;
pub mod config;
pub mod domain;
pub mod runner;
pub mod telemetry;
pub mod workload;
