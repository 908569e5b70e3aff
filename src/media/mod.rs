//! Media Relay - forwards uploaded images to an object store and hands back
//! their public URLs.
//!
//! One relay is chosen from [`MediaBackend`] at startup and shared through
//! `AppState`. Replaced or orphaned objects are deleted through the
//! [`cleanup::CleanupQueue`], never inline.

pub mod cleanup;
pub mod cloudinary;
pub mod gcs;
pub mod local;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MediaBackend, UploadConfig};
use cleanup::CleanupQueue;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Empty file")]
    Empty,

    #[error("File too large: {size} bytes (maximum {max})")]
    TooLarge { size: usize, max: usize },

    #[error("File content does not match an allowed image type")]
    UnsupportedType,

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("media backend misconfigured: {0}")]
    Config(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Errors caused by the uploaded file rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MediaError::Empty
                | MediaError::TooLarge { .. }
                | MediaError::UnsupportedType
                | MediaError::InvalidPath(_)
        )
    }
}

#[async_trait]
pub trait MediaRelay: Send + Sync {
    fn name(&self) -> &'static str;

    /// Store `bytes` at `path` and return the public URL.
    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, MediaError>;

    async fn exists(&self, path: &str) -> Result<bool, MediaError>;

    /// Deleting an object that is already gone succeeds.
    async fn remove(&self, path: &str) -> Result<(), MediaError>;

    /// Map a URL previously returned by [`MediaRelay::put`] back to its path.
    /// `None` for URLs this relay does not own.
    fn path_from_url(&self, url: &str) -> Option<String>;
}

pub fn build_relay(backend: &MediaBackend) -> Result<Arc<dyn MediaRelay>, MediaError> {
    Ok(match backend {
        MediaBackend::Local { dir, public_prefix } => {
            Arc::new(local::LocalRelay::new(dir.clone(), public_prefix.clone()))
        }
        MediaBackend::Gcs {
            bucket,
            service_account_key,
        } => Arc::new(gcs::GcsRelay::new(bucket, service_account_key)?),
        MediaBackend::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
            folder,
        } => Arc::new(cloudinary::CloudinaryRelay::new(
            cloud_name, api_key, api_secret, folder,
        )?),
    })
}

// ============================================================================
// Object paths
// ============================================================================

/// Top-level folder an upload is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPrefix {
    BlogImages,
    ProjectMain,
    ProjectAdditional,
}

impl MediaPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaPrefix::BlogImages => "blog_images",
            MediaPrefix::ProjectMain => "projects/main",
            MediaPrefix::ProjectAdditional => "projects/additional",
        }
    }
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<prefix>/<timestamp>__<filename>`, timestamp being ISO-8601 UTC with
/// `:`, `.` and `-` removed (`20240102T030405678Z`).
pub fn object_path(prefix: MediaPrefix, original_name: &str, now: DateTime<Utc>) -> String {
    let timestamp: String = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| !matches!(c, ':' | '.' | '-'))
        .collect();
    format!(
        "{}/{}__{}",
        prefix.as_str(),
        timestamp,
        sanitize_filename(original_name)
    )
}

/// Reject traversal and absolute paths before they reach a backend.
pub fn check_object_path(path: &str) -> Result<(), MediaError> {
    if path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(MediaError::InvalidPath(path.to_string()));
    }
    Ok(())
}

// ============================================================================
// Validation
// ============================================================================

pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

/// A file from a multipart request that passed [`validate_upload`]
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

impl Upload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

pub fn validate_upload(
    config: &UploadConfig,
    file_name: &str,
    bytes: Bytes,
) -> Result<Upload, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > config.max_file_size {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            max: config.max_file_size,
        });
    }
    let content_type = sniff_image_mime(&bytes).ok_or(MediaError::UnsupportedType)?;
    if !config.is_allowed(content_type) {
        return Err(MediaError::UnsupportedType);
    }
    Ok(Upload {
        file_name: file_name.to_string(),
        content_type,
        bytes,
    })
}

// ============================================================================
// Batch upload
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// One object path per upload. Files sharing a name in the same batch get
/// their batch index after the timestamp (`<ts>-<i>__<name>`).
fn batch_paths(uploads: &[(MediaPrefix, Upload)], now: DateTime<Utc>) -> Vec<String> {
    let mut seen = HashSet::new();
    uploads
        .iter()
        .enumerate()
        .map(|(i, (prefix, upload))| {
            let path = object_path(*prefix, &upload.file_name, now);
            if seen.insert(path.clone()) {
                return path;
            }
            let unique = match path.split_once("__") {
                Some((head, name)) => format!("{head}-{i}__{name}"),
                None => format!("{path}-{i}"),
            };
            seen.insert(unique.clone());
            unique
        })
        .collect()
}

/// Upload every file concurrently. If any upload fails the ones that
/// succeeded are scheduled for deletion and the first error is returned.
pub async fn upload_all(
    relay: &dyn MediaRelay,
    cleanup: &CleanupQueue,
    uploads: Vec<(MediaPrefix, Upload)>,
) -> Result<Vec<StoredObject>, MediaError> {
    let paths = batch_paths(&uploads, Utc::now());
    let puts = uploads.into_iter().zip(paths).map(|((_, upload), path)| async move {
        let url = relay.put(&path, upload.content_type, upload.bytes).await?;
        Ok::<_, MediaError>(StoredObject { path, url })
    });
    let results = join_all(puts).await;

    let mut stored = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(object) => stored.push(object),
            Err(e) => {
                tracing::error!("Media upload failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => Ok(stored),
        Some(e) => {
            for object in stored {
                cleanup.schedule(object.url);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memory::MemoryRelay;
    use std::time::Duration;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_object_path_format() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap()
            + chrono::Duration::milliseconds(678);
        assert_eq!(
            object_path(MediaPrefix::ProjectMain, "my photo.png", now),
            "projects/main/20240102T030405678Z__my_photo.png"
        );
    }

    #[tokio::test]
    async fn test_upload_all_keeps_same_named_files_apart() {
        let relay = Arc::new(MemoryRelay::new());
        let cleanup = CleanupQueue::with_backoff(relay.clone(), 1, Duration::from_millis(1));
        let file = || Upload {
            file_name: "image.png".to_string(),
            content_type: "image/png",
            bytes: Bytes::from_static(PNG),
        };

        let stored = upload_all(
            relay.as_ref(),
            &cleanup,
            vec![
                (MediaPrefix::BlogImages, file()),
                (MediaPrefix::BlogImages, file()),
                (MediaPrefix::ProjectMain, file()),
            ],
        )
        .await
        .unwrap();

        assert_ne!(stored[0].url, stored[1].url);
        assert!(stored[1].path.ends_with("-1__image.png"));
        assert!(!stored[2].path.contains("-2__"));
        assert_eq!(relay.len(), 3);
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\x\\ünï.jpg"), "_n_.jpg");
        assert_eq!(sanitize_filename("..."), "file");
    }

    #[test]
    fn test_check_object_path() {
        assert!(check_object_path("blog_images/a.png").is_ok());
        assert!(check_object_path("../a.png").is_err());
        assert!(check_object_path("/abs.png").is_err());
        assert!(check_object_path("a//b.png").is_err());
    }

    #[test]
    fn test_validate_upload() {
        let config = UploadConfig::default();
        assert!(matches!(
            validate_upload(&config, "a.png", Bytes::new()),
            Err(MediaError::Empty)
        ));
        assert!(matches!(
            validate_upload(&config, "a.png", Bytes::from_static(b"not an image")),
            Err(MediaError::UnsupportedType)
        ));
        let upload = validate_upload(&config, "a.png", Bytes::from_static(PNG)).unwrap();
        assert_eq!(upload.content_type, "image/png");

        let tiny = UploadConfig {
            max_file_size: 4,
            ..UploadConfig::default()
        };
        assert!(matches!(
            validate_upload(&tiny, "a.png", Bytes::from_static(PNG)),
            Err(MediaError::TooLarge { size: 8, max: 4 })
        ));
    }

    #[tokio::test]
    async fn test_upload_all_cleans_up_after_partial_failure() {
        let relay = Arc::new(MemoryRelay::failing_on("broken"));
        let cleanup = CleanupQueue::with_backoff(relay.clone(), 3, Duration::from_millis(1));

        let file = |name: &str| Upload {
            file_name: name.to_string(),
            content_type: "image/png",
            bytes: Bytes::from_static(PNG),
        };
        let err = upload_all(
            relay.as_ref(),
            &cleanup,
            vec![
                (MediaPrefix::BlogImages, file("ok.png")),
                (MediaPrefix::BlogImages, file("broken.png")),
            ],
        )
        .await
        .unwrap_err();
        assert!(!err.is_client_error());

        for _ in 0..100 {
            if relay.len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(relay.len(), 0);
    }
}
