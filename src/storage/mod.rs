/// Object store adapter
///
/// Uniform interface over {local filesystem, S3-compatible (AWS S3 /
/// Cloudflare R2)} for per-chunk writes, optional multipart lifecycle,
/// reads, listing, and deletion. Object keys always live under a fixed
/// `uploads/` prefix regardless of backend.
pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{Config, StorageBackend};
use crate::error::Result;

/// One part of a completed multipart upload.
#[derive(Debug, Clone)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// The result of writing a single chunk.
#[derive(Debug, Clone)]
pub struct WrittenChunk {
    pub storage_key: String,
    pub storage_etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Begin a multipart session for an upload, if the backend supports it
    /// and the coordinator has decided multipart is eligible. Returns the
    /// opaque multipart token.
    async fn initialize_upload(&self, upload_id: &str) -> Result<Option<String>>;

    /// Persist one chunk's bytes, optionally as part of a multipart session.
    async fn write_chunk(
        &self,
        upload_id: &str,
        chunk_index: i64,
        bytes: Bytes,
        multipart_token: Option<&str>,
    ) -> Result<WrittenChunk>;

    /// Finalize a multipart session with the sorted parts manifest.
    async fn complete_upload(
        &self,
        upload_id: &str,
        multipart_token: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// Read back a previously written chunk in full.
    async fn read_chunk(&self, storage_key: &str) -> Result<Bytes>;

    /// List all keys under a prefix (used by the maintenance sweep).
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete a single key. Best-effort from the caller's perspective.
    async fn delete_key(&self, storage_key: &str) -> Result<()>;
}

pub fn storage_key(upload_id: &str, chunk_index: i64) -> String {
    format!("uploads/{upload_id}/chunk_{chunk_index}")
}

pub fn assembled_key(upload_id: &str) -> String {
    format!("uploads/{upload_id}/assembled")
}

/// Build the configured object store adapter.
pub async fn build(config: &Config) -> Result<Box<dyn ObjectStore>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Box::new(local::LocalObjectStore::new(
            &config.storage.storage_root,
        ))),
        StorageBackend::S3 | StorageBackend::R2 => {
            Ok(Box::new(s3::S3ObjectStore::from_config(&config.storage).await?))
        }
    }
}
