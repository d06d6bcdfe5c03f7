//! # Blob storage
//!
//! Durable, path-addressable storage for uploaded workbooks and generated
//! artifacts. Uploads are streamed in fixed-size chunks so memory use does not
//! depend on file size.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file name: {0:?}")]
    InvalidFilename(String),
}

/// Top-level area a blob lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Uploaded roster workbooks
    Sources,
    /// Generated per-record files
    Artifacts,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Sources => "sources",
            Namespace::Artifacts => "artifacts",
        }
    }
}

/// Address of a stored blob: `{namespace}/{tenant|global}/{batch}/{filename}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub namespace: Namespace,
    pub tenant: Option<Uuid>,
    pub batch_id: Uuid,
    pub filename: String,
}

impl BlobKey {
    /// Build a key, reducing `filename` to its base name
    pub fn new(
        namespace: Namespace,
        tenant: Option<Uuid>,
        batch_id: Uuid,
        filename: &str,
    ) -> Result<Self, StorageError> {
        let filename = base_name(filename)
            .ok_or_else(|| StorageError::InvalidFilename(filename.to_string()))?;
        Ok(Self {
            namespace,
            tenant,
            batch_id,
            filename: filename.to_string(),
        })
    }

    /// Path relative to the namespace root, with `/` separators
    pub fn relative_path(&self) -> String {
        let tenant = self
            .tenant
            .map(|id| id.to_string())
            .unwrap_or_else(|| "global".to_string());
        format!("{}/{}/{}", tenant, self.batch_id, self.filename)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace.as_str(), self.relative_path())
    }
}

/// Last path component of a client-supplied name, if it is usable
pub fn base_name(name: &str) -> Option<&str> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => None,
        base => Some(base),
    }
}

/// Durable blob storage contract
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Copy `reader` to `key`, returning the number of bytes written
    async fn put_stream(
        &self,
        key: &BlobKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, StorageError>;

    /// Filesystem path holding `key`
    fn local_path(&self, key: &BlobKey) -> PathBuf;
}

/// Blob store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    chunk_bytes: usize,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, chunk_bytes: usize) -> Self {
        Self {
            root: root.into(),
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Stream `reader` into `partial`, returning the byte count
    async fn write_partial(
        &self,
        partial: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> std::io::Result<u64> {
        let mut file = fs::File::create(partial).await?;
        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut written = 0u64;

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).await?;
            written += read as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_stream(
        &self,
        key: &BlobKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, StorageError> {
        let path = self.local_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Written under a temporary name and renamed so readers never see a torn file
        let partial = partial_path(&path);
        let written = match self.write_partial(&partial, reader).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to remove partial blob");
                }
                return Err(err.into());
            }
        };
        fs::rename(&partial, &path).await?;

        tracing::debug!(key = %key, bytes = written, "Stored blob");
        Ok(written)
    }

    fn local_path(&self, key: &BlobKey) -> PathBuf {
        let mut path = self.root.join(key.namespace.as_str());
        path.push(key.tenant.map(|id| id.to_string()).unwrap_or_else(|| "global".to_string()));
        path.push(key.batch_id.to_string());
        path.push(&key.filename);
        path
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
