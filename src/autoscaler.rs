/// Worker-count autoscaler
///
/// Reads `WorkerPool` counters on a fixed cooldown and nudges the worker
/// count by one step within `[min_workers, max_workers]`: scale up when
/// the queue is backing up or inflight utilization is high, scale down
/// when utilization is low. A no-op when `AUTOSCALE_ENABLED=false`.
use std::sync::Arc;
use std::time::Duration;

use crate::app_state::AppState;

pub async fn run_loop(state: Arc<AppState>) {
    if !state.config.autoscale.enabled {
        tracing::info!("autoscaler disabled (AUTOSCALE_ENABLED=false)");
        return;
    }

    let cooldown = Duration::from_secs(state.config.autoscale.cooldown_seconds);
    let mut interval = tokio::time::interval(cooldown);

    loop {
        interval.tick().await;
        let cfg = &state.config.autoscale;
        let counters = state.worker_pool.counters();
        let utilization = counters.inflight as f64 / (counters.workers.max(1) as f64);

        let mut workers = counters.workers;
        if counters.queued >= cfg.scale_up_queue_threshold || utilization >= cfg.scale_up_utilization_threshold {
            workers = (workers + 1).min(cfg.max_workers);
        } else if utilization <= cfg.scale_down_utilization_threshold {
            workers = workers.saturating_sub(1).max(cfg.min_workers);
        }

        if workers != counters.workers {
            state.worker_pool.set_worker_count(workers);
            tracing::info!(
                from = counters.workers,
                to = workers,
                utilization,
                queued = counters.queued,
                "autoscaler adjusted worker count"
            );
        }
    }
}
