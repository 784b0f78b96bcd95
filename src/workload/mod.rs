pub mod bodies;
pub mod ids;
pub mod requests;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ApiVersion, Implementation, TargetEnv, Vendor};

pub use requests::{RequestFactory, RequestSpec};

/// The task families a worker can run. Config task names are the snake_case
/// renderings of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    TokenGeneration,
    GetMenu,
    Order,
    Release,
}

impl TaskKind {
    /// CamelCase fragment used inside stat display names
    /// (e.g. `PERF_US_GETMENU_DOORDASH_V1`).
    pub(crate) fn stat_fragment(&self) -> &'static str {
        match self {
            TaskKind::TokenGeneration => "TokenGeneration",
            TaskKind::GetMenu => "GetMenu",
            TaskKind::Order => "Order",
            TaskKind::Release => "Release",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("endpoint {endpoint} is not implemented for vendor {vendor}")]
    EndpointNotImplemented { endpoint: TaskKind, vendor: Vendor },
    #[error("no route for endpoint {endpoint} on environment {environment}")]
    RouteNotAvailable {
        endpoint: TaskKind,
        environment: TargetEnv,
    },
    #[error("no request body for endpoint {endpoint} with implementation {implementation} {version}")]
    BodyNotAvailable {
        endpoint: TaskKind,
        implementation: Implementation,
        version: ApiVersion,
    },
    #[error("no vendor with positive weight implements endpoint {endpoint}")]
    NoVendorAvailable { endpoint: TaskKind },
    #[error("no task has a positive weight")]
    NoRunnableTasks,
    #[error("serializing request body failed: {0}")]
    BodySerialization(#[from] serde_json::Error),
}

/// Weighted task chooser shared by all workers. Zero-weight entries are
/// excluded up front.
#[derive(Debug)]
pub struct WeightedTasks {
    kinds: Vec<TaskKind>,
    dist: WeightedIndex<u32>,
}

impl WeightedTasks {
    pub fn new(entries: &[(TaskKind, u32)]) -> Result<Self, WorkloadError> {
        let runnable: Vec<(TaskKind, u32)> = entries
            .iter()
            .copied()
            .filter(|(_, weight)| *weight > 0)
            .collect();
        let dist = WeightedIndex::new(runnable.iter().map(|(_, w)| *w))
            .map_err(|_| WorkloadError::NoRunnableTasks)?;
        Ok(Self {
            kinds: runnable.into_iter().map(|(kind, _)| kind).collect(),
            dist,
        })
    }

    pub fn pick(&self, rng: &mut impl Rng) -> TaskKind {
        self.kinds[self.dist.sample(rng)]
    }

    pub fn kinds(&self) -> &[TaskKind] {
        &self.kinds
    }
}
