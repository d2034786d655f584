use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::object_store::ObjectStore;

/// ObjectStore implementation over a local directory laid out as
/// `<root>/<bucket>/<key>`
#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read object {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
