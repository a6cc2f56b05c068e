/// Idempotency repository - the three idempotency-key tables
///
/// `scope` selects which logical table a key belongs to: init, chunk
/// (upload_id + chunk_index + key), or complete. Each row binds a key to a
/// single `request_fingerprint` and a single `upload_id`.
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::error::Result;

pub struct IdempotencyRecord {
    pub upload_id: String,
    pub request_fingerprint: String,
}

pub async fn find_init(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> Result<Option<IdempotencyRecord>> {
    find(tx, "idempotency_init", key).await
}

pub async fn insert_init(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    upload_id: &str,
    fingerprint: &str,
) -> Result<()> {
    insert(tx, "idempotency_init", key, upload_id, fingerprint).await
}

pub async fn find_chunk(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
    chunk_index: i64,
    key: &str,
) -> Result<Option<IdempotencyRecord>> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT upload_id, request_fingerprint FROM idempotency_chunk
         WHERE upload_id = $1 AND chunk_index = $2 AND idempotency_key = $3",
    )
    .bind(upload_id)
    .bind(chunk_index)
    .bind(key)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(upload_id, request_fingerprint)| IdempotencyRecord {
        upload_id,
        request_fingerprint,
    }))
}

pub async fn insert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
    chunk_index: i64,
    key: &str,
    fingerprint: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO idempotency_chunk (upload_id, chunk_index, idempotency_key, request_fingerprint, created_at)
         VALUES ($1, $2, $3, $4, NOW())
         ON CONFLICT (upload_id, chunk_index, idempotency_key) DO NOTHING",
    )
    .bind(upload_id)
    .bind(chunk_index)
    .bind(key)
    .bind(fingerprint)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn find_complete(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> Result<Option<IdempotencyRecord>> {
    find(tx, "idempotency_complete", key).await
}

pub async fn insert_complete(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    upload_id: &str,
    fingerprint: &str,
) -> Result<()> {
    insert(tx, "idempotency_complete", key, upload_id, fingerprint).await
}

async fn find(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    key: &str,
) -> Result<Option<IdempotencyRecord>> {
    let query = format!(
        "SELECT upload_id, request_fingerprint FROM {table} WHERE idempotency_key = $1"
    );
    let row: Option<(String, String)> = sqlx::query_as(&query)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.map(|(upload_id, request_fingerprint)| IdempotencyRecord {
        upload_id,
        request_fingerprint,
    }))
}

async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    key: &str,
    upload_id: &str,
    fingerprint: &str,
) -> Result<()> {
    let query = format!(
        "INSERT INTO {table} (idempotency_key, upload_id, request_fingerprint, created_at)
         VALUES ($1, $2, $3, NOW())
         ON CONFLICT (idempotency_key) DO NOTHING"
    );
    sqlx::query(&query)
        .bind(key)
        .bind(upload_id)
        .bind(fingerprint)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Delete idempotency rows across all three tables older than the TTL.
/// Best-effort: run from the maintenance loop, not from a request path.
pub async fn delete_expired_tx(
    tx: &mut Transaction<'_, Postgres>,
    older_than: DateTime<Utc>,
) -> Result<u64> {
    let mut total = 0u64;
    for table in ["idempotency_init", "idempotency_chunk", "idempotency_complete"] {
        let query = format!("DELETE FROM {table} WHERE created_at < $1");
        let result = sqlx::query(&query).bind(older_than).execute(&mut **tx).await?;
        total += result.rows_affected();
    }
    Ok(total)
}
