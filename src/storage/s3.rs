/// S3-compatible object store backend (AWS S3 and Cloudflare R2)
///
/// R2 is addressed through the S3 API with region `auto` and an endpoint
/// derived from the account id. Multipart sessions use the real
/// create/upload-part/complete lifecycle; single-part chunks use a plain
/// `put_object`.
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{CompletedPart, ObjectStore, WrittenChunk};
use crate::config::StorageConfig;
use crate::error::{AppError, Result};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn from_config(cfg: &StorageConfig) -> Result<Self> {
        use crate::config::StorageBackend;

        let (bucket, region, access_key, secret_key, endpoint) = match cfg.backend {
            StorageBackend::R2 => {
                let account_id = cfg.r2_account_id.clone().ok_or_else(|| {
                    AppError::Internal("R2_ACCOUNT_ID is required for the r2 backend".into())
                })?;
                let endpoint = cfg
                    .r2_endpoint
                    .clone()
                    .unwrap_or_else(|| format!("https://{account_id}.r2.cloudflarestorage.com"));
                (
                    cfg.r2_bucket.clone().ok_or_else(|| {
                        AppError::Internal("R2_BUCKET is required for the r2 backend".into())
                    })?,
                    "auto".to_string(),
                    cfg.r2_access_key_id.clone(),
                    cfg.r2_secret_access_key.clone(),
                    Some(endpoint),
                )
            }
            _ => (
                cfg.s3_bucket.clone().ok_or_else(|| {
                    AppError::Internal("S3_BUCKET is required for the s3 backend".into())
                })?,
                cfg.aws_region.clone(),
                cfg.aws_access_key_id.clone(),
                cfg.aws_secret_access_key.clone(),
                cfg.s3_endpoint.clone(),
            ),
        };

        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region));

        if let (Some(access_key_id), Some(secret_access_key)) = (access_key, secret_key) {
            let credentials =
                Credentials::new(access_key_id, secret_access_key, None, None, "chunked-ingest");
            builder = builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let aws_config = builder.load().await;
        let client = Client::new(&aws_config);

        Ok(Self { client, bucket })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn initialize_upload(&self, upload_id: &str) -> Result<Option<String>> {
        let key = super::assembled_key(upload_id);
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket))?;

        Ok(output.upload_id().map(str::to_string))
    }

    async fn write_chunk(
        &self,
        upload_id: &str,
        chunk_index: i64,
        bytes: Bytes,
        multipart_token: Option<&str>,
    ) -> Result<WrittenChunk> {
        let key = super::storage_key(upload_id, chunk_index);

        if let Some(upload_token) = multipart_token {
            let assembled_key = super::assembled_key(upload_id);
            // S3 part numbers are 1-indexed.
            let part_number = (chunk_index + 1) as i32;

            // Independently write a per-chunk object so random reads (missing-chunks
            // resume, maintenance, pre-complete inspection) work without relying on
            // the not-yet-finalized multipart object.
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(bytes.clone()))
                .send()
                .await
                .map_err(|e| classify(e, &self.bucket))?;

            let part_output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&assembled_key)
                .upload_id(upload_token)
                .part_number(part_number)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(|e| classify(e, &self.bucket))?;

            Ok(WrittenChunk {
                storage_key: key,
                storage_etag: part_output.e_tag().map(str::to_string),
            })
        } else {
            let output = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(|e| classify(e, &self.bucket))?;

            Ok(WrittenChunk {
                storage_key: key,
                storage_etag: output.e_tag().map(str::to_string),
            })
        }
    }

    async fn complete_upload(
        &self,
        upload_id: &str,
        multipart_token: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let key = super::assembled_key(upload_id);
        let completed_parts = parts
            .into_iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .upload_id(multipart_token)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket))?;

        Ok(())
    }

    async fn read_chunk(&self, storage_key: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Upstream(format!("failed to read object body: {e}")))?
            .into_bytes();

        Ok(bytes)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| classify(e, &self.bucket))?;
            keys.extend(output.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            match output.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn delete_key(&self, storage_key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| classify(e, &self.bucket))?;
        Ok(())
    }
}

fn classify<E: std::fmt::Display>(err: E, bucket: &str) -> AppError {
    let msg = err.to_string();
    if msg.contains("NoSuchKey") || msg.contains("404") {
        AppError::NotFound(format!("object not found in bucket {bucket}"))
    } else if msg.contains("AccessDenied") || msg.contains("403") || msg.contains("Forbidden") {
        AppError::Upstream(format!("object store access denied: {msg}"))
    } else if msg.contains("NoSuchBucket") {
        AppError::Upstream(format!("bucket {bucket} does not exist"))
    } else {
        AppError::Upstream(format!("object store error: {msg}"))
    }
}
