//! One worker per simulated user: pick a weighted task, run it, repeat until
//! cancelled. Workers share the session, the release queue, and the stats
//! registry; everything else is per-worker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::session::Session;
use crate::workload::{RequestFactory, RequestSpec, TaskKind, WeightedTasks};

/// Backoff when the release queue has nothing due; keeps a release-only
/// workload from spinning hot.
const RELEASE_NOT_DUE_BACKOFF: Duration = Duration::from_millis(100);

/// Pause after a spec could not even be built (catalog/config mismatch);
/// the error repeats on every iteration, so don't flood the log.
const BUILD_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Submitted orders waiting out the release delay, oldest first. Shared by
/// every worker.
#[derive(Default)]
pub struct ReleaseQueue {
    inner: Mutex<VecDeque<(RequestSpec, Instant)>>,
}

impl ReleaseQueue {
    pub fn push(&self, spec: RequestSpec) {
        self.inner.lock().push_back((spec, Instant::now()));
    }

    /// Removes and returns the oldest entry iff it has aged at least
    /// `min_age`. Check and removal happen under one lock, so concurrent
    /// workers never race each other for the same entry.
    pub fn pop_due(&self, min_age: Duration) -> Option<RequestSpec> {
        let mut queue = self.inner.lock();
        if queue.front().is_some_and(|(_, at)| at.elapsed() >= min_age) {
            queue.pop_front().map(|(spec, _)| spec)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Dependencies common to every worker in the pool.
pub struct WorkerShared {
    pub session: Arc<Session>,
    pub factory: Arc<RequestFactory>,
    pub tasks: Arc<WeightedTasks>,
    pub queue: Arc<ReleaseQueue>,
    pub release_wait: Duration,
    pub log_responses: bool,
}

pub struct Worker {
    id: usize,
    shared: Arc<WorkerShared>,
    rng: StdRng,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(id: usize, shared: Arc<WorkerShared>, cancel: CancellationToken) -> Self {
        Self {
            id,
            shared,
            rng: StdRng::from_entropy(),
            cancel,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(worker = self.id, "worker started");
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.step() => {}
            }
        }
        tracing::debug!(worker = self.id, "worker stopped");
    }

    async fn step(&mut self) {
        match self.shared.tasks.pick(&mut self.rng) {
            TaskKind::TokenGeneration => self.token_generation().await,
            TaskKind::GetMenu => self.get_menu().await,
            TaskKind::Order => self.order().await,
            TaskKind::Release => self.release().await,
        }
    }

    async fn token_generation(&mut self) {
        let spec = self.shared.factory.token_generation(&mut self.rng, None);
        self.send_built(spec).await;
    }

    async fn get_menu(&mut self) {
        let spec = self.shared.factory.get_menu(&mut self.rng, None);
        self.send_built(spec).await;
    }

    /// Submits an order and queues its release for after the release delay.
    async fn order(&mut self) {
        let spec = self.shared.factory.order(&mut self.rng, None);
        let Some(mut spec) = self.built(spec).await else {
            return;
        };
        let response = self.shared.session.send(&mut spec).await;

        let release = self.shared.factory.release_for(
            Arc::clone(&spec.profile),
            spec.store_id.clone().unwrap_or_default(),
            spec.order_id.clone().unwrap_or_default(),
        );
        match release {
            Ok(release) => self.shared.queue.push(release),
            Err(err) => error!(error = %err, "building release request failed"),
        }

        self.log_response(&spec, &response);
    }

    /// Sends the oldest queued release once it has waited out the delay.
    async fn release(&mut self) {
        match self.shared.queue.pop_due(self.shared.release_wait) {
            Some(mut spec) => {
                let response = self.shared.session.send(&mut spec).await;
                self.log_response(&spec, &response);
            }
            None => {
                if self.shared.log_responses {
                    info!("no release request due");
                }
                tokio::time::sleep(RELEASE_NOT_DUE_BACKOFF).await;
            }
        }
    }

    async fn send_built(&mut self, spec: Result<RequestSpec, crate::workload::WorkloadError>) {
        if let Some(mut spec) = self.built(spec).await {
            let response = self.shared.session.send(&mut spec).await;
            self.log_response(&spec, &response);
        }
    }

    async fn built(
        &self,
        spec: Result<RequestSpec, crate::workload::WorkloadError>,
    ) -> Option<RequestSpec> {
        match spec {
            Ok(spec) => Some(spec),
            Err(err) => {
                error!(worker = self.id, error = %err, "building request failed");
                tokio::time::sleep(BUILD_ERROR_BACKOFF).await;
                None
            }
        }
    }

    fn log_response(&self, spec: &RequestSpec, response: &Value) {
        if self.shared.log_responses {
            info!(endpoint = %spec.display_name, response = %response, "response");
        }
    }
}
