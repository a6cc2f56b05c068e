/// Upload coordinator - the control-plane state machine
///
/// Owns init/chunk-upload/missing-chunks/complete/download. Chunk
/// persistence is routed through either the bounded worker pool (no
/// external durable queue configured) or the durable queue + rendezvous
/// store, with up to `max_retries` attempts either way.
use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::Principal;
use crate::checksum::{fingerprint, hex_digest};
use crate::db::{chunk_repo, idempotency_repo, upload_repo};
use crate::error::{AppError, Result};
use crate::models::{
    ChunkUploadResponse, InitUploadRequest, MissingChunksResponse, Upload, UploadResponse, UploadStatus,
};
use crate::queue::{ChunkWriteOutcome, ChunkWriteResult, ChunkWriteTask};
use crate::range;
use crate::storage::{CompletedPart, WrittenChunk};

pub struct UploadCoordinator {
    state: Arc<AppState>,
}

pub struct DownloadSegment {
    pub storage_key: String,
    pub start: usize,
    pub end: usize,
}

pub struct DownloadPlan {
    pub file_name: String,
    pub content_length: u64,
    pub content_range: Option<String>,
    pub partial: bool,
    pub segments: Vec<DownloadSegment>,
}

#[derive(Serialize)]
struct InitFingerprint<'a> {
    file_name: &'a str,
    file_size: i64,
    chunk_size: i64,
    file_checksum_sha256: Option<&'a str>,
}

#[derive(Serialize)]
struct ChunkFingerprint<'a> {
    upload_id: &'a str,
    chunk_index: i64,
    chunk_checksum_sha256: &'a str,
}

#[derive(Serialize)]
struct CompleteFingerprint<'a> {
    upload_id: &'a str,
}

impl UploadCoordinator {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn init(
        &self,
        principal: &Principal,
        req: &InitUploadRequest,
        idempotency_key: Option<&str>,
    ) -> Result<UploadResponse> {
        let chunk_size = req
            .chunk_size
            .unwrap_or(self.state.config.concurrency.chunk_size_bytes as i64);
        if chunk_size <= 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        let total_chunks = ((req.file_size + chunk_size - 1) / chunk_size).max(1);

        let fp = fingerprint(&InitFingerprint {
            file_name: &req.file_name,
            file_size: req.file_size,
            chunk_size,
            file_checksum_sha256: req.file_checksum_sha256.as_deref(),
        });

        let mut tx = self.state.pool.begin().await?;

        if let Some(key) = idempotency_key {
            if let Some(existing) = idempotency_repo::find_init(&mut tx, key).await? {
                if existing.request_fingerprint != fp {
                    return Err(AppError::Conflict(
                        "idempotency key reused with a different init request".into(),
                    ));
                }
                let upload = upload_repo::get_upload_tx(&mut tx, &existing.upload_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("idempotency record points at a missing upload".into())
                    })?;
                tx.commit().await?;
                return Ok(upload.into());
            }
        }

        let upload_id = Uuid::new_v4().to_string();
        let multipart_token = if self
            .state
            .config
            .multipart_eligible(total_chunks as u64, chunk_size as u64)
        {
            self.state.storage.initialize_upload(&upload_id).await?
        } else {
            None
        };

        let upload = upload_repo::create_upload(
            &mut tx,
            &upload_id,
            &principal.user_id,
            &req.file_name,
            req.file_size,
            chunk_size,
            total_chunks,
            req.file_checksum_sha256.as_deref(),
            multipart_token.as_deref(),
        )
        .await?;

        if let Some(key) = idempotency_key {
            idempotency_repo::insert_init(&mut tx, key, &upload.id, &fp).await?;
        }

        tx.commit().await?;
        Ok(upload.into())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upload_chunk(
        &self,
        principal: &Principal,
        upload_id: &str,
        chunk_index: i64,
        content_length: Option<usize>,
        chunk_sha256_header: Option<&str>,
        idempotency_key: Option<&str>,
        bytes: Bytes,
    ) -> Result<ChunkUploadResponse> {
        let upload = self.load_owned_upload(principal, upload_id).await?;

        if !matches!(upload.status(), UploadStatus::Initiated | UploadStatus::InProgress) {
            return Err(AppError::Conflict(format!(
                "upload {upload_id} is not accepting chunks in status {}",
                upload.status
            )));
        }
        if chunk_index < 0 || chunk_index >= upload.total_chunks {
            return Err(AppError::Validation(format!(
                "chunk_index {chunk_index} out of range [0, {})",
                upload.total_chunks
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("chunk body must not be empty".into()));
        }
        if let Some(len) = content_length {
            if len != bytes.len() {
                return Err(AppError::Validation(
                    "Content-Length does not match the received body".into(),
                ));
            }
        }

        let checksum = hex_digest(&bytes);
        if let Some(expected) = chunk_sha256_header {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(AppError::Validation("chunk checksum mismatch".into()));
            }
        }

        let fp = fingerprint(&ChunkFingerprint {
            upload_id,
            chunk_index,
            chunk_checksum_sha256: &checksum,
        });

        if let Some(key) = idempotency_key {
            let mut tx = self.state.pool.begin().await?;
            if let Some(existing) = idempotency_repo::find_chunk(&mut tx, upload_id, chunk_index, key).await? {
                if existing.request_fingerprint != fp {
                    return Err(AppError::Conflict(
                        "idempotency key reused with a different chunk body".into(),
                    ));
                }
                if let Some(chunk) = chunk_repo::get_chunk(&self.state.pool, upload_id, chunk_index).await? {
                    if chunk.status() == crate::models::ChunkStatus::Uploaded {
                        tx.commit().await?;
                        return Ok(ChunkUploadResponse {
                            upload_id: upload_id.to_string(),
                            chunk_index,
                            status: "UPLOADED",
                        });
                    }
                }
            }
            tx.commit().await?;
        }

        let size_bytes = bytes.len() as i64;
        let written = self
            .persist_chunk(upload_id, chunk_index, &checksum, upload.multipart_upload_id.as_deref(), bytes)
            .await?;

        let mut tx = self.state.pool.begin().await?;
        chunk_repo::upsert_chunk(
            &mut tx,
            upload_id,
            chunk_index,
            size_bytes,
            &checksum,
            &written.storage_key,
            written.storage_etag.as_deref(),
            crate::models::ChunkStatus::Uploaded.as_str(),
        )
        .await?;

        if matches!(upload.status(), UploadStatus::Initiated) {
            upload_repo::transition_status(&mut tx, upload_id, "INITIATED", "IN_PROGRESS").await?;
        }

        if let Some(key) = idempotency_key {
            idempotency_repo::insert_chunk(&mut tx, upload_id, chunk_index, key, &fp).await?;
        }
        tx.commit().await?;

        Ok(ChunkUploadResponse {
            upload_id: upload_id.to_string(),
            chunk_index,
            status: "UPLOADED",
        })
    }

    /// Write a chunk via the worker pool (local path) or the durable queue
    /// + rendezvous store (external backends), retrying up to
    /// `concurrency.max_retries` times either way.
    async fn persist_chunk(
        &self,
        upload_id: &str,
        chunk_index: i64,
        checksum: &str,
        multipart_token: Option<&str>,
        bytes: Bytes,
    ) -> Result<WrittenChunk> {
        let max_retries = self.state.config.concurrency.max_retries;

        if self.state.uses_durable_queue() {
            let task_id = Uuid::new_v4().to_string();
            let task = ChunkWriteTask {
                task_id: task_id.clone(),
                upload_id: upload_id.to_string(),
                chunk_index,
                chunk_checksum_sha256: checksum.to_string(),
                multipart_token: multipart_token.map(str::to_string),
                bytes,
            };

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                self.state.queue.enqueue(task.clone()).await?;
                let outcome = self
                    .state
                    .result_store
                    .await_result(&task_id, self.state.queue_task_timeout())
                    .await;

                match outcome {
                    Ok(ChunkWriteResult {
                        outcome: ChunkWriteOutcome::Written { storage_key, storage_etag },
                        ..
                    }) => return Ok(WrittenChunk { storage_key, storage_etag }),
                    Ok(ChunkWriteResult {
                        outcome: ChunkWriteOutcome::Failed { reason },
                        ..
                    }) => {
                        self.record_retry_or_fail("queue", attempt, max_retries)?;
                        if attempt >= max_retries {
                            return Err(AppError::Upstream(format!("chunk write failed: {reason}")));
                        }
                    }
                    Err(_) => {
                        self.record_retry_or_fail("queue_timeout", attempt, max_retries)?;
                        if attempt >= max_retries {
                            return Err(AppError::Timeout(format!(
                                "chunk {chunk_index} persistence timed out after {attempt} attempts"
                            )));
                        }
                    }
                }
            }
        }

        let _guard = self.state.worker_pool.admit(upload_id)?;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .state
                .storage
                .write_chunk(upload_id, chunk_index, bytes.clone(), multipart_token)
                .await
            {
                Ok(written) => return Ok(written),
                Err(err) => {
                    self.record_retry_or_fail("pool", attempt, max_retries)?;
                    if attempt >= max_retries {
                        return Err(err);
                    }
                }
            }
        }
    }

    fn record_retry_or_fail(&self, stage: &str, attempt: u32, max_retries: u32) -> Result<()> {
        self.state.metrics.retries_total.with_label_values(&[stage]).inc();
        if attempt >= max_retries {
            self.state
                .metrics
                .chunk_upload_failures_total
                .with_label_values(&[stage])
                .inc();
        }
        Ok(())
    }

    pub async fn missing_chunks(&self, principal: &Principal, upload_id: &str) -> Result<MissingChunksResponse> {
        let upload = self.load_owned_upload(principal, upload_id).await?;
        let uploaded: HashSet<i64> = chunk_repo::list_uploaded_indexes(&self.state.pool, upload_id)
            .await?
            .into_iter()
            .collect();
        let missing_chunk_indexes = (0..upload.total_chunks).filter(|i| !uploaded.contains(i)).collect();
        Ok(MissingChunksResponse { missing_chunk_indexes })
    }

    pub async fn complete(
        &self,
        principal: &Principal,
        upload_id: &str,
        idempotency_key: Option<&str>,
    ) -> Result<UploadResponse> {
        let upload = self.load_owned_upload(principal, upload_id).await?;

        let fp = fingerprint(&CompleteFingerprint { upload_id });
        let mut tx = self.state.pool.begin().await?;

        if let Some(key) = idempotency_key {
            if let Some(existing) = idempotency_repo::find_complete(&mut tx, key).await? {
                if existing.request_fingerprint != fp || existing.upload_id != upload_id {
                    return Err(AppError::Conflict(
                        "idempotency key reused for a different upload".into(),
                    ));
                }
            }
        }

        match upload.status() {
            UploadStatus::Completed => {
                if let Some(key) = idempotency_key {
                    idempotency_repo::insert_complete(&mut tx, key, upload_id, &fp).await?;
                }
                tx.commit().await?;
                return Ok(upload.into());
            }
            UploadStatus::Initiated | UploadStatus::InProgress => {}
            other => {
                return Err(AppError::Conflict(format!(
                    "upload {upload_id} cannot be completed from status {}",
                    other.as_str()
                )));
            }
        }

        let uploaded = chunk_repo::count_uploaded(&mut tx, upload_id).await?;
        if uploaded != upload.total_chunks {
            return Err(AppError::Conflict(format!(
                "upload {upload_id} has {uploaded}/{} chunks uploaded",
                upload.total_chunks
            )));
        }

        let chunks = chunk_repo::list_ordered(&self.state.pool, upload_id).await?;

        if let Some(expected) = &upload.file_checksum_sha256 {
            let mut hasher = Sha256::new();
            for chunk in &chunks {
                let bytes = self.state.storage.read_chunk(&chunk.storage_key).await?;
                hasher.update(&bytes);
            }
            let actual = hex::encode(hasher.finalize());
            if &actual != expected {
                upload_repo::set_status(&mut tx, upload_id, "FAILED").await?;
                tx.commit().await?;
                return Err(AppError::Conflict(
                    "assembled file checksum does not match file_checksum_sha256".into(),
                ));
            }
        }

        if let Some(token) = &upload.multipart_upload_id {
            let mut parts = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let etag = chunk.storage_etag.clone().ok_or_else(|| {
                    AppError::Internal(format!(
                        "chunk {} has no storage_etag required for multipart completion",
                        chunk.chunk_index
                    ))
                })?;
                parts.push(CompletedPart {
                    part_number: (chunk.chunk_index + 1) as i32,
                    etag,
                });
            }
            self.state.storage.complete_upload(upload_id, token, parts).await?;
        }

        upload_repo::set_status(&mut tx, upload_id, "COMPLETED").await?;
        let upload = upload_repo::get_upload_tx(&mut tx, upload_id)
            .await?
            .ok_or_else(|| AppError::Internal("upload vanished during completion".into()))?;

        if let Some(key) = idempotency_key {
            idempotency_repo::insert_complete(&mut tx, key, upload_id, &fp).await?;
        }

        tx.commit().await?;
        Ok(upload.into())
    }

    pub async fn download_plan(
        &self,
        principal: &Principal,
        upload_id: &str,
        range_header: Option<&str>,
    ) -> Result<DownloadPlan> {
        let upload = self.load_owned_upload(principal, upload_id).await?;
        if upload.status() != UploadStatus::Completed {
            return Err(AppError::Conflict(format!("upload {upload_id} is not complete")));
        }

        let chunks = chunk_repo::list_ordered(&self.state.pool, upload_id).await?;
        if chunks.len() as i64 != upload.total_chunks {
            return Err(AppError::Internal(format!(
                "upload {upload_id} is COMPLETED but chunk rows are inconsistent"
            )));
        }

        let file_size = upload.file_size as u64;
        let parsed_range = range::parse(range_header, file_size)?;

        let mut segments = Vec::new();
        let mut offset = 0u64;
        for chunk in &chunks {
            let chunk_len = chunk.size_bytes as u64;
            match parsed_range {
                Some(r) => {
                    if let Some((start, end)) = range::intersect(r, offset, chunk_len) {
                        segments.push(DownloadSegment {
                            storage_key: chunk.storage_key.clone(),
                            start,
                            end,
                        });
                    }
                }
                None => segments.push(DownloadSegment {
                    storage_key: chunk.storage_key.clone(),
                    start: 0,
                    end: (chunk_len - 1) as usize,
                }),
            }
            offset += chunk_len;
        }

        let (content_length, content_range, partial) = match parsed_range {
            Some(r) => (r.len(), Some(r.content_range_header(file_size)), true),
            None => (file_size, None, false),
        };

        Ok(DownloadPlan {
            file_name: upload.file_name,
            content_length,
            content_range,
            partial,
            segments,
        })
    }

    async fn load_owned_upload(&self, principal: &Principal, upload_id: &str) -> Result<Upload> {
        let upload = upload_repo::get_upload(&self.state.pool, upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("upload {upload_id} not found")))?;

        if !principal.is_admin && upload.owner_id != principal.user_id {
            return Err(AppError::Forbidden(format!(
                "principal {} does not own upload {upload_id}",
                principal.user_id
            )));
        }

        Ok(upload)
    }
}
