use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Gateway coordinates
// ============================================================================

/// Gateway deployment a run is aimed at.
///
/// `Perf` sits behind real auth and hands out bearer tokens; `Alb` and `Nlb`
/// accept the placeholder token, so token generation never blocks a task there.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetEnv {
    Perf,
    Alb,
    Nlb,
}

/// Gateway API version a vendor integration speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
}

/// Wire-format flavor of a vendor integration. Standard vendors share the V1
/// bodies and form-encoded token endpoint; Uber has its own JSON auth and V2
/// bodies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Implementation {
    Standard,
    Uber,
}

/// Store ids below this are reserved for non-loadtest purposes.
pub const MIN_STORE_NUMBER: u32 = 15;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Market {
    Us,
    Ca,
}

impl Market {
    /// Highest store number provisioned for this market; random store ids are
    /// drawn from `MIN_STORE_NUMBER..=max_store_number()`.
    pub fn max_store_number(&self) -> u32 {
        match self {
            Market::Us => 40_000,
            Market::Ca => 15_000,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Vendor {
    Doordash,
    Ubereats,
    Grubhub,
    Postmates,
    Skipthedishes,
}

// ============================================================================
// Load stages
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum StageError {
    #[error("target_rps must be non-negative, got {0}")]
    NegativeTargetRps(f64),
    #[error("minutes_to_reach_target must be positive, got {0}")]
    NonPositiveDuration(f64),
    #[error("curve must be non-negative, got {0}")]
    NegativeCurve(f64),
}

/// One phase of a run.
///
/// Over `minutes_to_reach_target` the load ramps from the previous stage's
/// `target_rps` to this stage's, following a sine curve raised to `curve`:
/// below 2 most users (de)spawn early in the stage, above 2 late, and 0
/// degenerates to a step that the pool then chases linearly at the configured
/// rampup rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub target_rps: f64,
    pub minutes_to_reach_target: f64,
    #[serde(default = "default_curve")]
    pub curve: f64,
}

fn default_curve() -> f64 {
    2.0
}

impl Stage {
    pub const fn new(target_rps: f64, minutes_to_reach_target: f64, curve: f64) -> Self {
        Self {
            target_rps,
            minutes_to_reach_target,
            curve,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.minutes_to_reach_target * 60.0
    }

    pub fn validate(&self) -> Result<(), StageError> {
        if self.target_rps < 0.0 {
            return Err(StageError::NegativeTargetRps(self.target_rps));
        }
        if self.minutes_to_reach_target <= 0.0 {
            return Err(StageError::NonPositiveDuration(self.minutes_to_reach_target));
        }
        if self.curve < 0.0 {
            return Err(StageError::NegativeCurve(self.curve));
        }
        Ok(())
    }
}
