/// Local filesystem object store backend
///
/// Stores each chunk as its own file under `storage_root`. Multipart
/// sessions are a no-op here: local storage has no native multipart
/// concept, so `initialize_upload` always returns `None` and assembly
/// is the coordinator's job via sequential reads.
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{CompletedPart, ObjectStore, WrittenChunk};
use crate::error::{AppError, Result};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
        }
    }

    fn path_for(&self, storage_key: &str) -> PathBuf {
        self.root.join(storage_key)
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    async fn initialize_upload(&self, _upload_id: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn write_chunk(
        &self,
        upload_id: &str,
        chunk_index: i64,
        bytes: Bytes,
        _multipart_token: Option<&str>,
    ) -> Result<WrittenChunk> {
        let storage_key = super::storage_key(upload_id, chunk_index);
        let path = self.path_for(&storage_key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        fs::rename(&tmp_path, &path).await?;

        Ok(WrittenChunk {
            storage_key,
            storage_etag: None,
        })
    }

    async fn complete_upload(
        &self,
        _upload_id: &str,
        _multipart_token: &str,
        _parts: Vec<CompletedPart>,
    ) -> Result<()> {
        Ok(())
    }

    async fn read_chunk(&self, storage_key: &str) -> Result<Bytes> {
        let path = self.path_for(storage_key);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("storage key {storage_key} not found"))
            } else {
                AppError::from(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path_for(prefix);
        let mut keys = Vec::new();
        walk(&self.root, &dir, &mut keys).await?;
        Ok(keys)
    }

    async fn delete_key(&self, storage_key: &str) -> Result<()> {
        let path = self.path_for(storage_key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::from(e)),
        }
    }
}

async fn walk(root: &Path, start: &Path, out: &mut Vec<String>) -> Result<()> {
    let mut pending = vec![start.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(AppError::from(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                if let Some(key) = rel.to_str() {
                    out.push(key.replace(std::path::MAIN_SEPARATOR, "/"));
                }
            }
        }
    }
    Ok(())
}
