//! Upload storage: persist document bytes and fetch them back by identifier.
//!
//! The workflow only needs [`UploadResolver::load`]; `save` exists so callers
//! (the CLI, an HTTP front end) have somewhere to put bytes before sending a
//! `FILE_UPLOAD::` message. Two backends ship with the crate:
//!
//! - [`DirUploadStore`]: `<id><ext>` data file plus `<id>.json` metadata in
//!   one directory. Survives restarts.
//! - [`MemoryUploadStore`]: a `DashMap`, for tests and embedded use.

use crate::error::DocflowError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// MIME types accepted without looking at the extension.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
    "image/tiff",
    "application/pdf",
    "application/x-pdf",
];

/// Extensions accepted without looking at the MIME type.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".webp", ".gif", ".tif", ".tiff", ".pdf",
];

const DEFAULT_FILENAME: &str = "uploaded-file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// A stored upload with its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub record: UploadRecord,
    pub bytes: Vec<u8>,
}

impl StoredUpload {
    /// JSON payload handed to the file analyzers:
    /// `{file_id, filename, content_type, size, base64}`.
    pub fn to_payload(&self) -> Value {
        json!({
            "file_id": self.record.file_id,
            "filename": self.record.filename,
            "content_type": self.record.content_type,
            "size": self.record.size,
            "base64": STANDARD.encode(&self.bytes),
        })
    }
}

/// Storage backend for uploaded documents.
#[async_trait]
pub trait UploadResolver: Send + Sync {
    /// Validate and store `bytes`, returning the new record.
    async fn save(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<UploadRecord, DocflowError>;

    /// Fetch an upload. `Err(DocflowError::UploadNotFound)` when absent.
    async fn load(&self, file_id: &str) -> Result<StoredUpload, DocflowError>;
}

/// Lower-cased extension including the dot, or `""`.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Check the allow-list and fill in defaults. Shared by both backends.
fn admit(
    bytes: &[u8],
    filename: Option<&str>,
    content_type: Option<&str>,
) -> Result<UploadRecord, DocflowError> {
    let filename = filename
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string();
    let content_type = content_type
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_lowercase();
    let extension = extension_of(&filename);

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str())
        && !ALLOWED_EXTENSIONS.contains(&extension.as_str())
    {
        return Err(DocflowError::UnsupportedType {
            filename,
            content_type,
        });
    }

    Ok(UploadRecord {
        file_id: Uuid::new_v4().simple().to_string(),
        filename,
        content_type,
        size: bytes.len() as u64,
    })
}

// ── Directory backend ────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(flatten)]
    record: UploadRecord,
    path: PathBuf,
}

/// Directory-backed upload store.
#[derive(Debug, Clone)]
pub struct DirUploadStore {
    root: PathBuf,
}

impl DirUploadStore {
    /// Open (and create if needed) the store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DocflowError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| DocflowError::UploadIo {
                path: root.clone(),
                source: e,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, file_id: &str) -> PathBuf {
        self.root.join(format!("{file_id}.json"))
    }
}

/// Identifiers are generated hex; anything else cannot name a stored file and
/// must not be joined onto the root path.
fn is_valid_file_id(file_id: &str) -> bool {
    !file_id.is_empty() && file_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DocflowError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| DocflowError::UploadIo {
            path: tmp_path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DocflowError::UploadIo {
            path: path.to_path_buf(),
            source: e,
        })
}

#[async_trait]
impl UploadResolver for DirUploadStore {
    async fn save(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<UploadRecord, DocflowError> {
        let record = admit(&bytes, filename, content_type)?;
        let extension = match extension_of(&record.filename) {
            e if e.is_empty() => ".bin".to_string(),
            e => e,
        };
        let data_path = self.root.join(format!("{}{}", record.file_id, extension));

        write_atomic(&data_path, &bytes).await?;

        let meta_path = self.metadata_path(&record.file_id);
        let meta = MetadataFile {
            record: record.clone(),
            path: data_path,
        };
        let body = serde_json::to_vec_pretty(&meta).map_err(|e| DocflowError::Serialization {
            path: meta_path.clone(),
            source: e,
        })?;
        // Metadata last: `load` only sees uploads whose data is complete.
        write_atomic(&meta_path, &body).await?;

        info!(
            "Stored upload {} ({}, {} bytes)",
            record.file_id, record.content_type, record.size
        );
        Ok(record)
    }

    async fn load(&self, file_id: &str) -> Result<StoredUpload, DocflowError> {
        let not_found = || DocflowError::UploadNotFound {
            file_id: file_id.to_string(),
        };
        if !is_valid_file_id(file_id) {
            return Err(not_found());
        }

        let meta_path = self.metadata_path(file_id);
        let raw = match tokio::fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(DocflowError::UploadIo {
                    path: meta_path,
                    source: e,
                })
            }
        };
        let meta: MetadataFile =
            serde_json::from_slice(&raw).map_err(|e| DocflowError::Serialization {
                path: meta_path.clone(),
                source: e,
            })?;

        let bytes = match tokio::fs::read(&meta.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(DocflowError::UploadIo {
                    path: meta.path,
                    source: e,
                })
            }
        };

        debug!("Loaded upload {} ({} bytes)", file_id, bytes.len());
        Ok(StoredUpload {
            record: meta.record,
            bytes,
        })
    }
}

// ── In-memory backend ────────────────────────────────────────────────────

/// In-memory upload store.
#[derive(Debug, Default)]
pub struct MemoryUploadStore {
    uploads: DashMap<String, StoredUpload>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}

#[async_trait]
impl UploadResolver for MemoryUploadStore {
    async fn save(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<UploadRecord, DocflowError> {
        let record = admit(&bytes, filename, content_type)?;
        self.uploads.insert(
            record.file_id.clone(),
            StoredUpload {
                record: record.clone(),
                bytes,
            },
        );
        Ok(record)
    }

    async fn load(&self, file_id: &str) -> Result<StoredUpload, DocflowError> {
        self.uploads
            .get(file_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DocflowError::UploadNotFound {
                file_id: file_id.to_string(),
            })
    }
}
