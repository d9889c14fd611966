//! Media storage for uploaded post images.

use std::path::PathBuf;

use crate::{AppError, AppResult};

/// Metadata of a stored file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Storage key, relative to the media root.
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Where an upload is filed under the media root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// The single inline image of a post (`posts/`).
    PostImage,
    /// An image attached to a post through the gallery (`images/`).
    GalleryImage,
}

impl MediaKind {
    const fn dir(self) -> &'static str {
        match self {
            Self::PostImage => "posts",
            Self::GalleryImage => "images",
        }
    }
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a file under the given key.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile>;

    /// Delete a file. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));
        tracing::debug!(key = %key, size = data.len(), "Stored media file");

        Ok(StoredFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        tokio::fs::try_exists(self.base_path.join(key))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {e}")))
    }
}

/// Generate a unique storage key for an upload.
///
/// Keys look like `posts/2024/05/01/<uuid>.png`. The extension comes from
/// the detected format, never from the client-supplied file name.
#[must_use]
pub fn generate_storage_key(kind: MediaKind, extension: &str) -> String {
    let date_path = chrono::Utc::now().format("%Y/%m/%d");
    format!(
        "{}/{date_path}/{}.{extension}",
        kind.dir(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("traveltube-storage-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key(MediaKind::PostImage, "jpg");
        assert!(key.starts_with("posts/"));
        assert!(key.ends_with(".jpg"));

        let key = generate_storage_key(MediaKind::GalleryImage, "png");
        assert!(key.starts_with("images/"));
        assert_eq!(key.matches('/').count(), 4);
    }

    #[test]
    fn test_public_url_trims_slash() {
        let storage = LocalStorage::new(PathBuf::from("/tmp"), "/media/".to_string());
        assert_eq!(storage.public_url("posts/a.png"), "/media/posts/a.png");
    }

    #[tokio::test]
    async fn test_upload_exists_delete() {
        let root = temp_root();
        let storage = LocalStorage::new(root.clone(), "/media".to_string());

        let stored = storage
            .upload("posts/2024/01/01/a.png", b"data", "image/png")
            .await
            .unwrap();
        assert_eq!(stored.size, 4);
        assert_eq!(stored.md5, format!("{:x}", md5::compute(b"data")));
        assert!(storage.exists(&stored.key).await.unwrap());

        storage.delete(&stored.key).await.unwrap();
        assert!(!storage.exists(&stored.key).await.unwrap());

        // Deleting twice is fine.
        storage.delete(&stored.key).await.unwrap();

        let _ = tokio::fs::remove_dir_all(root).await;
    }
}
