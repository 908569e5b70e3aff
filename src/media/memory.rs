//! Test relay keeping objects in a map.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{check_object_path, MediaError, MediaRelay};

const URL_PREFIX: &str = "memory://";

#[derive(Default)]
pub struct MemoryRelay {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_on: Option<String>,
    fail_removes: AtomicBool,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `put` whose path contains `needle` fails.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl MediaRelay for MemoryRelay {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, path: &str, _content_type: &str, bytes: Bytes) -> Result<String, MediaError> {
        check_object_path(path)?;
        if self.fail_on.as_deref().is_some_and(|needle| path.contains(needle)) {
            return Err(MediaError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
        Ok(format!("{URL_PREFIX}{path}"))
    }

    async fn exists(&self, path: &str) -> Result<bool, MediaError> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(MediaError::Upstream {
                status: 500,
                body: "remove failed".to_string(),
            });
        }
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(URL_PREFIX).map(str::to_string)
    }
}
