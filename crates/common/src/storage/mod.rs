//! Local file storage for uploaded documents

use crate::errors::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Stored object metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Path relative to the storage root
    pub path: String,
    pub size: usize,
    /// SHA-256 hex digest
    pub content_hash: String,
}

/// Files under one root directory, addressed by relative paths
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an upload under `{organization_id}/{document_id}/{filename}`
    pub async fn put(
        &self,
        organization_id: Uuid,
        document_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let relative = format!(
            "{}/{}/{}",
            organization_id,
            document_id,
            sanitize_filename(filename)
        );
        let full = self.resolve(&relative)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        tracing::debug!(path = %relative, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            path: relative,
            size: bytes.len(),
            content_hash: content_hash(bytes),
        })
    }

    pub async fn get(&self, relative: &str) -> Result<Vec<u8>> {
        let full = self.resolve(relative)?;
        Ok(tokio::fs::read(&full).await?)
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        let full = self.resolve(relative)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Join a relative path onto the root, refusing anything that escapes it
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if relative.is_empty() || escapes {
            return Err(AppError::Storage {
                message: format!("Invalid storage path: {}", relative),
            });
        }
        Ok(self.root.join(path))
    }
}

/// SHA-256 of the content as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Keep ASCII alphanumerics, dot, dash and underscore
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
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
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let org = Uuid::new_v4();
        let doc = Uuid::new_v4();

        let stored = assert_ok!(
            storage
                .put(org, doc, "Floor Plan (v2).pdf", b"%PDF-1.4 test")
                .await
        );

        assert_eq!(stored.path, format!("{}/{}/Floor_Plan__v2_.pdf", org, doc));
        assert_eq!(stored.size, 13);
        assert_eq!(stored.content_hash.len(), 64);
        assert_eq!(storage.get(&stored.path).await.unwrap(), b"%PDF-1.4 test");

        assert_ok!(storage.delete(&stored.path).await);
        assert!(storage.get(&stored.path).await.is_err());
        // Deleting twice is fine
        assert_ok!(storage.delete(&stored.path).await);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        for bad in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(storage.get(bad).await, Err(AppError::Storage { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../secret.txt"), "secret.txt");
        assert_eq!(sanitize_filename("C:\\docs\\plan.md"), "plan.md");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("///"), "upload");
    }
}
