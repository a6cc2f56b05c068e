/// Chunk repository - database operations for the `chunks` table
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Result;
use crate::models::Chunk;

/// Insert-or-update a chunk row, keyed by `(upload_id, chunk_index)`.
/// Last-writer-wins at the metadata level: a retried chunk write with a
/// different storage key/etag simply overwrites the prior row.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
    chunk_index: i64,
    size_bytes: i64,
    chunk_checksum_sha256: &str,
    storage_key: &str,
    storage_etag: Option<&str>,
    status: &str,
) -> Result<Chunk> {
    let chunk = sqlx::query_as::<_, Chunk>(
        "INSERT INTO chunks (
            upload_id, chunk_index, size_bytes, chunk_checksum_sha256,
            storage_key, storage_etag, status, retry_count, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, NOW(), NOW())
        ON CONFLICT (upload_id, chunk_index) DO UPDATE SET
            size_bytes = EXCLUDED.size_bytes,
            chunk_checksum_sha256 = EXCLUDED.chunk_checksum_sha256,
            storage_key = EXCLUDED.storage_key,
            storage_etag = EXCLUDED.storage_etag,
            status = EXCLUDED.status,
            updated_at = NOW()
        RETURNING upload_id, chunk_index, size_bytes, chunk_checksum_sha256,
                  storage_key, storage_etag, status, retry_count, created_at, updated_at",
    )
    .bind(upload_id)
    .bind(chunk_index)
    .bind(size_bytes)
    .bind(chunk_checksum_sha256)
    .bind(storage_key)
    .bind(storage_etag)
    .bind(status)
    .fetch_one(&mut **tx)
    .await?;

    Ok(chunk)
}

pub async fn get_chunk(
    pool: &PgPool,
    upload_id: &str,
    chunk_index: i64,
) -> Result<Option<Chunk>> {
    let chunk = sqlx::query_as::<_, Chunk>(
        "SELECT upload_id, chunk_index, size_bytes, chunk_checksum_sha256,
                storage_key, storage_etag, status, retry_count, created_at, updated_at
         FROM chunks WHERE upload_id = $1 AND chunk_index = $2",
    )
    .bind(upload_id)
    .bind(chunk_index)
    .fetch_optional(pool)
    .await?;

    Ok(chunk)
}

pub async fn list_uploaded_indexes(pool: &PgPool, upload_id: &str) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT chunk_index FROM chunks WHERE upload_id = $1 AND status = 'UPLOADED'
         ORDER BY chunk_index ASC",
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(i,)| i).collect())
}

pub async fn count_uploaded(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM chunks WHERE upload_id = $1 AND status = 'UPLOADED'",
    )
    .bind(upload_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// All chunks for an upload in ascending index order, for checksum
/// verification and multipart-parts assembly.
pub async fn list_ordered(pool: &PgPool, upload_id: &str) -> Result<Vec<Chunk>> {
    let chunks = sqlx::query_as::<_, Chunk>(
        "SELECT upload_id, chunk_index, size_bytes, chunk_checksum_sha256,
                storage_key, storage_etag, status, retry_count, created_at, updated_at
         FROM chunks WHERE upload_id = $1 ORDER BY chunk_index ASC",
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await?;

    Ok(chunks)
}

pub async fn list_storage_keys(pool: &PgPool, upload_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT storage_key FROM chunks WHERE upload_id = $1")
            .bind(upload_id)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(k,)| k).collect())
}

pub async fn delete_for_upload_tx(tx: &mut Transaction<'_, Postgres>, upload_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM chunks WHERE upload_id = $1")
        .bind(upload_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
