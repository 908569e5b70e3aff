use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use super::{check_object_path, MediaError, MediaRelay};

/// Writes objects under a directory that the router serves statically.
pub struct LocalRelay {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalRelay {
    pub fn new(dir: PathBuf, public_prefix: String) -> Self {
        Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, MediaError> {
        check_object_path(path)?;
        Ok(self.dir.join(path))
    }
}

#[async_trait]
impl MediaRelay for LocalRelay {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, path: &str, _content_type: &str, bytes: Bytes) -> Result<String, MediaError> {
        let file_path = self.resolve(path)?;
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, &bytes).await?;
        tracing::info!("Image stored: {} ({} bytes)", path, bytes.len());
        Ok(format!("{}/{}", self.public_prefix, path))
    }

    async fn exists(&self, path: &str) -> Result<bool, MediaError> {
        let file_path = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&file_path).await?)
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        let file_path = self.resolve(path)?;
        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|path| check_object_path(path).is_ok())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cms-media-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_put_exists_remove() {
        let dir = temp_dir();
        let relay = LocalRelay::new(dir.clone(), "/uploads/".to_string());

        let url = relay
            .put("blog_images/x.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(url, "/uploads/blog_images/x.png");

        let path = relay.path_from_url(&url).unwrap();
        assert!(relay.exists(&path).await.unwrap());
        relay.remove(&path).await.unwrap();
        assert!(!relay.exists(&path).await.unwrap());
        relay.remove(&path).await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let relay = LocalRelay::new(temp_dir(), "/uploads".to_string());
        let err = relay
            .put("../escape.png", "image/png", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(relay.path_from_url("/uploads/../etc/passwd"), None);
        assert_eq!(relay.path_from_url("https://cdn.test/x.png"), None);
    }
}
