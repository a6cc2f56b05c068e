/// Data models for the ingestion control plane
///
/// Defines the Upload/Chunk entities, their status enums, and the
/// request/response DTOs used by the HTTP handlers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ========================================
// Upload
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Initiated,
    InProgress,
    Completed,
    Failed,
    Aborted,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INITIATED" => Some(Self::Initiated),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "ABORTED" => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// Upload database entity
#[derive(Debug, Clone, FromRow)]
pub struct Upload {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
    pub file_checksum_sha256: Option<String>,
    pub status: String,
    pub multipart_upload_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Upload {
    pub fn status(&self) -> UploadStatus {
        UploadStatus::from_str(&self.status).unwrap_or(UploadStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub upload_id: String,
    pub chunk_size: i64,
    pub total_chunks: i64,
    pub status: String,
}

impl From<Upload> for UploadResponse {
    fn from(u: Upload) -> Self {
        Self {
            upload_id: u.id,
            chunk_size: u.chunk_size,
            total_chunks: u.total_chunks,
            status: u.status,
        }
    }
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct InitUploadRequest {
    #[validate(length(min = 1))]
    pub file_name: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    pub chunk_size: Option<i64>,
    pub file_checksum_sha256: Option<String>,
}

// ========================================
// Chunk
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkStatus {
    Pending,
    Uploaded,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Uploaded => "UPLOADED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "UPLOADED" => Some(Self::Uploaded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Chunk {
    pub upload_id: String,
    pub chunk_index: i64,
    pub size_bytes: i64,
    pub chunk_checksum_sha256: String,
    pub storage_key: String,
    pub storage_etag: Option<String>,
    pub status: String,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    pub fn status(&self) -> ChunkStatus {
        ChunkStatus::from_str(&self.status).unwrap_or(ChunkStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkUploadResponse {
    pub upload_id: String,
    pub chunk_index: i64,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingChunksResponse {
    pub missing_chunk_indexes: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupStats {
    pub stale_uploads_deleted: u64,
    pub idempotency_rows_deleted: u64,
    pub storage_keys_deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionResponse {
    pub app_name: &'static str,
    pub app_version: &'static str,
    pub queue_backend: &'static str,
    pub storage_backend: &'static str,
}
