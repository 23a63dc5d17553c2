//! Content Store Abstraction
//!
//! Addressable blob storage for originals and previews.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chat_core::traits::Id;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Seekable byte stream handed out by a content store
pub trait ContentStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> ContentStream for T {}

/// Build `{namespace}/{stem}.{ext}`; the dot is omitted for an empty extension
pub fn build_path(namespace: &str, stem: &str, extension: &str) -> String {
    let namespace = namespace.trim_matches('/');
    let file = if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    };

    if namespace.is_empty() {
        file
    } else {
        format!("{}/{}", namespace, file)
    }
}

/// Content store trait - unified interface for blob backends
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Prefix under which all blobs of this store live
    fn namespace(&self) -> &str;

    /// Path of an attachment's original blob
    fn original_path(&self, id: Id, extension: &str) -> String {
        build_path(self.namespace(), &id.to_string(), extension)
    }

    /// Path of an attachment's preview blob
    fn preview_path(&self, id: Id, extension: &str) -> String {
        build_path(self.namespace(), &format!("{}_preview", id), extension)
    }

    /// Open a stored blob for reading
    async fn open(&self, path: &str) -> StorageResult<Box<dyn ContentStream>>;

    /// Store everything readable from `reader` at `path`, returning the byte count
    async fn save(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64>;

    /// Remove a blob; removing a missing blob is not an error
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// Local filesystem store
pub struct LocalContentStore {
    /// Root directory for storage
    root: PathBuf,
    namespace: String,
}

impl LocalContentStore {
    /// Create a new local store
    pub fn new(root: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            namespace: namespace.into(),
        }
    }

    /// Resolve a path to a location under the root
    fn resolve_path(&self, path: &str) -> StorageResult<PathBuf> {
        // Prevent directory traversal
        if path.is_empty()
            || path.contains("..")
            || path.starts_with('/')
            || path.starts_with('\\')
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(path))
    }

    /// Ensure parent directory exists
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[instrument(skip(self), fields(store = "local"))]
    async fn open(&self, path: &str) -> StorageResult<Box<dyn ContentStream>> {
        let full = self.resolve_path(path)?;

        match fs::File::open(&full).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, reader), fields(store = "local"))]
    async fn save(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let full = self.resolve_path(path)?;
        self.ensure_parent(&full).await?;

        let mut file = fs::File::create(&full).await?;
        let size = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        debug!(path = ?full, size, "Blob stored");

        Ok(size)
    }

    #[instrument(skip(self), fields(store = "local"))]
    async fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.resolve_path(path)?;

        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path = ?full, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve_path(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory store for testing
pub struct MemoryContentStore {
    namespace: String,
    files: RwLock<HashMap<String, Bytes>>,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new("attachments")
    }
}

impl MemoryContentStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            files: RwLock::new(HashMap::new()),
        }
    }

    /// Raw contents of a stored blob
    pub async fn get(&self, path: &str) -> Option<Bytes> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn open(&self, path: &str) -> StorageResult<Box<dyn ContentStream>> {
        let files = self.files.read().await;
        files
            .get(path)
            .map(|data| Box::new(std::io::Cursor::new(data.clone())) as Box<dyn ContentStream>)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn save(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        let size = buffer.len() as u64;

        let mut files = self.files.write().await;
        files.insert(path.to_string(), Bytes::from(buffer));

        Ok(size)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let files = self.files.read().await;
        Ok(files.contains_key(path))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
