//! LocalAssetUploader - ローカルディレクトリを Blob ストレージとして使う
//!
//! `root_dir/<key>` に書き込み、`<public_base_url>/<key>` を返します。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::PipelineError;
use crate::ports::AssetUploader;

pub struct LocalAssetUploader {
    root_dir: PathBuf,
    public_base_url: String,
}

impl LocalAssetUploader {
    pub fn new(root_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(PipelineError::Storage(format!("invalid asset key: {key:?}")));
        }
        Ok(self.root_dir.join(relative))
    }
}

#[async_trait]
impl AssetUploader for LocalAssetUploader {
    async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<String, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Storage(format!("refusing empty upload for {key}")));
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Storage(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| PipelineError::Storage(format!("{}: {e}", path.display())))?;

        debug!(key, size = bytes.len(), "asset stored");
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_under_root_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalAssetUploader::new(dir.path(), "https://cdn.example.com/");

        let url = uploader
            .upload(vec![1, 2, 3], "posts/abc.jpg")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/posts/abc.jpg");
        let written = tokio::fs::read(dir.path().join("posts/abc.jpg")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalAssetUploader::new(dir.path(), "https://cdn.example.com");

        for key in ["../evil.jpg", "/etc/passwd", ""] {
            let err = uploader.upload(vec![1], key).await.unwrap_err();
            assert!(matches!(err, PipelineError::Storage(_)), "{key}");
        }
    }

    #[tokio::test]
    async fn rejects_empty_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalAssetUploader::new(dir.path(), "https://cdn.example.com");
        assert!(uploader.upload(Vec::new(), "posts/x.jpg").await.is_err());
    }
}
