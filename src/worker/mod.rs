/// Worker pool and admission gate
///
/// Bounded pool of chunk-persistence tasks with three admission tiers
/// evaluated in order (queue-full, global-inflight, per-upload), plus a
/// counters snapshot the autoscaler reads. When an external durable
/// queue is configured the pool is bypassed entirely: the coordinator
/// enqueues instead and awaits the rendezvous store.
pub mod limiter;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::ConcurrencyConfig;
use crate::error::AppError;

pub use limiter::RateLimiter;

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCounters {
    pub queued: usize,
    pub inflight: usize,
    pub workers: usize,
}

struct PoolState {
    queued: usize,
    inflight: usize,
    workers: usize,
    per_upload_inflight: HashMap<String, usize>,
}

/// Admission gate and inflight bookkeeping for the bounded worker pool.
///
/// Holds no executor of its own: callers that pass admission run the
/// actual chunk write (either inline via `tokio::task::spawn_blocking`-style
/// work, or by enqueuing to the durable queue) and call `release` when done.
pub struct WorkerPool {
    state: Mutex<PoolState>,
    config: ConcurrencyConfig,
}

impl WorkerPool {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let workers = config.worker_count;
        Self {
            state: Mutex::new(PoolState {
                queued: 0,
                inflight: 0,
                workers,
                per_upload_inflight: HashMap::new(),
            }),
            config,
        }
    }

    /// Evaluate all four admission tiers (the rate-limiter tier is handled
    /// separately at the middleware layer) and, if admitted, reserve a slot.
    /// Returns an `AdmissionGuard` whose drop releases the slot — callers
    /// must hold it for the lifetime of the chunk write.
    pub fn admit(&self, upload_id: &str) -> Result<AdmissionGuard<'_>, AppError> {
        let mut state = self.state.lock().expect("worker pool mutex poisoned");

        if state.queued >= self.config.task_queue_maxsize {
            return Err(AppError::Throttled {
                reason: "queue_full",
            });
        }
        if state.inflight >= self.config.max_global_inflight_chunks {
            return Err(AppError::Throttled {
                reason: "global_inflight_limit",
            });
        }

        let per_upload = *state.per_upload_inflight.get(upload_id).unwrap_or(&0);
        if per_upload >= self.config.max_inflight_chunks_per_upload {
            return Err(AppError::Throttled {
                reason: "upload_inflight_limit",
            });
        }
        if per_upload >= self.config.max_fair_inflight_chunks_per_upload {
            return Err(AppError::Throttled {
                reason: "upload_fair_share_limit",
            });
        }

        state.queued += 1;
        state.inflight += 1;
        *state.per_upload_inflight.entry(upload_id.to_string()).or_insert(0) += 1;

        Ok(AdmissionGuard {
            pool: self,
            upload_id: upload_id.to_string(),
        })
    }

    pub fn counters(&self) -> PoolCounters {
        let state = self.state.lock().expect("worker pool mutex poisoned");
        PoolCounters {
            queued: state.queued,
            inflight: state.inflight,
            workers: state.workers,
        }
    }

    pub fn set_worker_count(&self, workers: usize) {
        let mut state = self.state.lock().expect("worker pool mutex poisoned");
        state.workers = workers;
    }

    fn release(&self, upload_id: &str) {
        let mut state = self.state.lock().expect("worker pool mutex poisoned");
        state.queued = state.queued.saturating_sub(1);
        state.inflight = state.inflight.saturating_sub(1);
        if let Some(count) = state.per_upload_inflight.get_mut(upload_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.per_upload_inflight.remove(upload_id);
            }
        }
    }
}

/// RAII admission slot. Always release on drop so a failed or cancelled
/// chunk write never leaks an inflight count.
pub struct AdmissionGuard<'a> {
    pool: &'a WorkerPool,
    upload_id: String,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.upload_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_global: usize, max_upload: usize, fair_share: usize, queue_max: usize) -> ConcurrencyConfig {
        ConcurrencyConfig {
            chunk_size_bytes: 4,
            max_retries: 3,
            worker_count: 4,
            task_queue_maxsize: queue_max,
            max_global_inflight_chunks: max_global,
            max_inflight_chunks_per_upload: max_upload,
            max_fair_inflight_chunks_per_upload: fair_share,
        }
    }

    #[test]
    fn queue_full_rejects_before_anything_else() {
        let pool = WorkerPool::new(config(10, 10, 10, 0));
        let err = pool.admit("u1").unwrap_err();
        assert!(matches!(err, AppError::Throttled { reason: "queue_full" }));
    }

    #[test]
    fn hard_cap_takes_priority_over_fair_share() {
        let pool = WorkerPool::new(config(10, 0, 10, 10));
        let err = pool.admit("u1").unwrap_err();
        assert!(matches!(
            err,
            AppError::Throttled {
                reason: "upload_inflight_limit"
            }
        ));
    }

    #[test]
    fn release_on_drop_frees_the_slot() {
        let pool = WorkerPool::new(config(1, 1, 1, 1));
        {
            let _guard = pool.admit("u1").unwrap();
            assert_eq!(pool.counters().inflight, 1);
            assert!(pool.admit("u1").is_err());
        }
        assert_eq!(pool.counters().inflight, 0);
        assert!(pool.admit("u1").is_ok());
    }
}
