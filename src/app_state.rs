/// Application context
///
/// Explicit collaborators constructed once at startup and shared across
/// every handler via `web::Data`. Replaces the global mutable singletons
/// (queue handle, worker pool, rate limiter) a naive port would reach
/// for with values owned by this struct.
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::queue::{ChunkResultStore, TaskQueue};
use crate::storage::ObjectStore;
use crate::worker::{RateLimiter, WorkerPool};

pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub storage: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub result_store: Arc<ChunkResultStore>,
    pub worker_pool: Arc<WorkerPool>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Metrics,
}

impl AppState {
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = crate::db::connect(&config.database).await?;
        let storage: Arc<dyn ObjectStore> = Arc::from(crate::storage::build(&config).await?);
        let queue: Arc<dyn TaskQueue> = Arc::from(crate::queue::build(&config).await?);
        let result_store = Arc::new(ChunkResultStore::new());
        let worker_pool = Arc::new(WorkerPool::new(config.concurrency.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.auth.api_rate_limit_per_minute));
        let metrics = Metrics::new();

        Ok(Self {
            config,
            pool,
            storage,
            queue,
            result_store,
            worker_pool,
            rate_limiter,
            metrics,
        })
    }

    pub fn queue_task_timeout(&self) -> Duration {
        Duration::from_secs(self.config.queue.task_timeout_seconds)
    }

    /// Whether a durable external queue backend is configured; if so, the
    /// coordinator routes chunk writes through `queue` + `result_store`
    /// instead of running them inline under the worker pool's admission gate.
    pub fn uses_durable_queue(&self) -> bool {
        !matches!(self.config.queue.backend, crate::config::QueueBackend::Memory)
    }
}
