/// Periodic maintenance sweep
///
/// Deletes uploads stuck in INITIATED/IN_PROGRESS past their TTL (plus
/// their storage keys, best-effort), expired idempotency rows, and any
/// orphaned storage keys left behind by an upload whose metadata row is
/// already gone. Runs on a fixed interval from a background task and is
/// also invocable synchronously from the admin cleanup endpoint.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::app_state::AppState;
use crate::db::{chunk_repo, idempotency_repo, upload_repo};
use crate::error::Result;
use crate::models::CleanupStats;

pub async fn run_sweep(state: &AppState) -> Result<CleanupStats> {
    let now = Utc::now();

    let stale_cutoff = now - ChronoDuration::seconds(state.config.maintenance.stale_upload_ttl_seconds);
    let stale = upload_repo::list_stale(&state.pool, stale_cutoff).await?;

    // Storage deletes can't share a transaction with Postgres, so they run
    // first, best-effort; the metadata deletes below are all-or-nothing.
    let mut storage_keys_deleted = 0u64;
    for upload in &stale {
        let keys = chunk_repo::list_storage_keys(&state.pool, &upload.id).await?;
        for key in keys {
            if state.storage.delete_key(&key).await.is_ok() {
                storage_keys_deleted += 1;
            }
        }
    }

    let idempotency_cutoff = now - ChronoDuration::seconds(state.config.maintenance.idempotency_ttl_seconds);

    let mut tx = state.pool.begin().await?;
    for upload in &stale {
        chunk_repo::delete_for_upload_tx(&mut tx, &upload.id).await?;
        upload_repo::delete_upload_tx(&mut tx, &upload.id).await?;
    }
    let idempotency_rows_deleted = idempotency_repo::delete_expired_tx(&mut tx, idempotency_cutoff).await?;
    tx.commit().await?;

    storage_keys_deleted += sweep_orphan_storage_keys(state).await.unwrap_or(0);

    Ok(CleanupStats {
        stale_uploads_deleted: stale.len() as u64,
        idempotency_rows_deleted,
        storage_keys_deleted,
    })
}

/// Best-effort: any upload id referenced under the `uploads/` prefix that
/// no longer has a metadata row gets its keys deleted. Listing failures
/// (a backend that can't enumerate cheaply) are swallowed — this is a
/// backstop sweep, not a correctness guarantee.
async fn sweep_orphan_storage_keys(state: &AppState) -> Option<u64> {
    let keys = state.storage.list_keys("uploads/").await.ok()?;

    let mut ids = HashSet::new();
    for key in &keys {
        if let Some(id) = key.strip_prefix("uploads/").and_then(|rest| rest.split('/').next()) {
            ids.insert(id.to_string());
        }
    }

    let mut deleted = 0u64;
    for id in ids {
        if upload_repo::get_upload(&state.pool, &id).await.ok().flatten().is_some() {
            continue;
        }
        let prefix = format!("uploads/{id}/");
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            if state.storage.delete_key(key).await.is_ok() {
                deleted += 1;
            }
        }
    }
    Some(deleted)
}

pub async fn run_loop(state: Arc<AppState>) {
    if !state.config.maintenance.cleanup_enabled {
        tracing::info!("maintenance sweep disabled (CLEANUP_ENABLED=false)");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(state.config.maintenance.cleanup_interval_seconds));
    loop {
        interval.tick().await;
        match run_sweep(&state).await {
            Ok(stats) => tracing::info!(
                stale_uploads_deleted = stats.stale_uploads_deleted,
                idempotency_rows_deleted = stats.idempotency_rows_deleted,
                storage_keys_deleted = stats.storage_keys_deleted,
                "maintenance sweep completed"
            ),
            Err(err) => tracing::error!(error = %err, "maintenance sweep failed"),
        }
    }
}
