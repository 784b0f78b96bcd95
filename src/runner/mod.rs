pub mod session;
pub mod shape;
pub mod stats;
pub mod worker;

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use session::Session;
pub use shape::{ShapeTick, StageShape};
pub use stats::{StatsRegistry, StatsSnapshot};
pub use worker::{ReleaseQueue, Worker, WorkerShared};

use crate::config::Config;
use crate::workload::{RequestFactory, WeightedTasks};

/// Live view of the run, fed by the shape loop and read by the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunnerStatus {
    pub stage_index: usize,
    pub stage_count: usize,
    pub desired_users: u32,
    pub active_users: usize,
    pub finished: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub stats: Arc<StatsRegistry>,
    pub status: Arc<RwLock<RunnerStatus>>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        let status = RunnerStatus {
            stage_count: cfg.workload.stages.len(),
            ..Default::default()
        };
        Self {
            cfg,
            stats: Arc::new(StatsRegistry::default()),
            status: Arc::new(RwLock::new(status)),
            cancel: CancellationToken::new(),
        }
    }
}

/// Spawns the console reporter and the run loop; the returned handle resolves
/// when the run ends (stages exhausted or cancelled).
pub fn spawn_runner_tasks(state: AppState) -> JoinHandle<Result<()>> {
    tokio::spawn(stats::run_reporter(
        Arc::clone(&state.stats),
        state.cfg.stats.console_interval_secs,
        state.cancel.clone(),
    ));
    tokio::spawn(run(state))
}

/// The run loop: once a second ask the shape how many users should exist,
/// then move the worker pool toward that number no faster than the configured
/// rampup rate.
pub async fn run(state: AppState) -> Result<()> {
    let cfg = &state.cfg;
    let factory = Arc::new(RequestFactory::new(
        cfg.target.environment,
        cfg.target.base_urls.clone(),
    ));
    let session = Arc::new(Session::new(cfg, Arc::clone(&factory), Arc::clone(&state.stats))?);
    let tasks = Arc::new(WeightedTasks::new(&cfg.task_weights())?);
    let shared = Arc::new(WorkerShared {
        session,
        factory,
        tasks,
        queue: Arc::new(ReleaseQueue::default()),
        release_wait: Duration::from_secs(cfg.workload.release_wait_secs),
        log_responses: cfg.workload.log_responses,
    });

    let mut shape = StageShape::new(
        cfg.workload.stages.clone(),
        cfg.workload.default_rampup,
        Instant::now(),
    );
    let mut pool: Vec<(CancellationToken, JoinHandle<()>)> = Vec::new();
    let mut next_worker_id = 0usize;

    info!(
        environment = %cfg.target.environment,
        stages = shape.stage_count(),
        "load test starting"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => {
                info!("run cancelled");
                break;
            }
            _ = interval.tick() => {}
        }

        match shape.tick(state.stats.avg_response_time_secs(), Instant::now()) {
            ShapeTick::Finished => {
                info!("all stages complete");
                break;
            }
            ShapeTick::Run {
                desired_users,
                spawn_rate,
            } => {
                resize_pool(
                    &mut pool,
                    &mut next_worker_id,
                    desired_users as usize,
                    spawn_rate,
                    &shared,
                );
                let mut status = state.status.write().await;
                status.stage_index = shape.stage_index();
                status.desired_users = desired_users;
                status.active_users = pool.len();
            }
        }
    }

    for (token, _) in &pool {
        token.cancel();
    }
    futures::future::join_all(pool.into_iter().map(|(_, handle)| handle)).await;
    {
        let mut status = state.status.write().await;
        status.active_users = 0;
        status.finished = true;
    }

    state.stats.report();
    state.stats.failure_report();
    Ok(())
}

/// Moves the pool toward `desired`, capped at `spawn_rate` changes per tick.
fn resize_pool(
    pool: &mut Vec<(CancellationToken, JoinHandle<()>)>,
    next_worker_id: &mut usize,
    desired: usize,
    spawn_rate: f64,
    shared: &Arc<WorkerShared>,
) {
    let step = spawn_rate.ceil().max(1.0) as usize;
    if pool.len() < desired {
        let spawning = (desired - pool.len()).min(step);
        for _ in 0..spawning {
            let cancel = CancellationToken::new();
            let worker = Worker::new(*next_worker_id, Arc::clone(shared), cancel.clone());
            *next_worker_id += 1;
            pool.push((cancel, tokio::spawn(worker.run())));
        }
        debug!(active = pool.len(), desired, "spawned workers");
    } else if pool.len() > desired {
        let stopping = (pool.len() - desired).min(step);
        for _ in 0..stopping {
            if let Some((token, _handle)) = pool.pop() {
                token.cancel();
            }
        }
        debug!(active = pool.len(), desired, "stopped workers");
    }
}
