/// Upload repository - database operations for uploads
///
/// Centralizes all SQLx queries touching the `uploads` table so higher
/// layers (the coordinator, handlers) stay focused on transport and
/// business rules.
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Result;
use crate::models::Upload;

#[allow(clippy::too_many_arguments)]
pub async fn create_upload(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    owner_id: &str,
    file_name: &str,
    file_size: i64,
    chunk_size: i64,
    total_chunks: i64,
    file_checksum_sha256: Option<&str>,
    multipart_upload_id: Option<&str>,
) -> Result<Upload> {
    let upload = sqlx::query_as::<_, Upload>(
        "INSERT INTO uploads (
            id, owner_id, file_name, file_size, chunk_size, total_chunks,
            file_checksum_sha256, status, multipart_upload_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'INITIATED', $8, NOW(), NOW())
        RETURNING id, owner_id, file_name, file_size, chunk_size, total_chunks,
                  file_checksum_sha256, status, multipart_upload_id, created_at, updated_at",
    )
    .bind(id)
    .bind(owner_id)
    .bind(file_name)
    .bind(file_size)
    .bind(chunk_size)
    .bind(total_chunks)
    .bind(file_checksum_sha256)
    .bind(multipart_upload_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(upload)
}

pub async fn get_upload(pool: &PgPool, upload_id: &str) -> Result<Option<Upload>> {
    let upload = sqlx::query_as::<_, Upload>(
        "SELECT id, owner_id, file_name, file_size, chunk_size, total_chunks,
                file_checksum_sha256, status, multipart_upload_id, created_at, updated_at
         FROM uploads WHERE id = $1",
    )
    .bind(upload_id)
    .fetch_optional(pool)
    .await?;

    Ok(upload)
}

pub async fn get_upload_tx(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
) -> Result<Option<Upload>> {
    let upload = sqlx::query_as::<_, Upload>(
        "SELECT id, owner_id, file_name, file_size, chunk_size, total_chunks,
                file_checksum_sha256, status, multipart_upload_id, created_at, updated_at
         FROM uploads WHERE id = $1 FOR UPDATE",
    )
    .bind(upload_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(upload)
}

/// Transition status; only applies when the current status is `from`.
/// Returns the refreshed row, or `None` if the upload does not exist or
/// was not in the expected state (caller decides how to treat that).
pub async fn transition_status(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
    from: &str,
    to: &str,
) -> Result<Option<Upload>> {
    let upload = sqlx::query_as::<_, Upload>(
        "UPDATE uploads
         SET status = $3, updated_at = NOW()
         WHERE id = $1 AND status = $2
         RETURNING id, owner_id, file_name, file_size, chunk_size, total_chunks,
                   file_checksum_sha256, status, multipart_upload_id, created_at, updated_at",
    )
    .bind(upload_id)
    .bind(from)
    .bind(to)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(upload)
}

pub async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    upload_id: &str,
    status: &str,
) -> Result<()> {
    sqlx::query("UPDATE uploads SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(upload_id)
        .bind(status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn list_stale(pool: &PgPool, older_than: DateTime<Utc>) -> Result<Vec<Upload>> {
    let uploads = sqlx::query_as::<_, Upload>(
        "SELECT id, owner_id, file_name, file_size, chunk_size, total_chunks,
                file_checksum_sha256, status, multipart_upload_id, created_at, updated_at
         FROM uploads
         WHERE status IN ('INITIATED', 'IN_PROGRESS') AND created_at < $1",
    )
    .bind(older_than)
    .fetch_all(pool)
    .await?;

    Ok(uploads)
}

pub async fn delete_upload_tx(tx: &mut Transaction<'_, Postgres>, upload_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM uploads WHERE id = $1")
        .bind(upload_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
