//! Uploaded product image storage on the local filesystem.
//!
//! Files are written under `<media_dir>/products/` with a random UUID name,
//! keeping only the (lowercased) extension of the uploaded file. The path
//! stored in the database is relative to the media root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Subdirectory of the media root holding product images.
const PRODUCT_DIR: &str = "products";

/// Accepted image extensions.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Errors from media storage.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Upload had no bytes.
    #[error("empty upload")]
    Empty,

    /// File name has no accepted image extension.
    #[error("unsupported image type: {0:?}")]
    UnsupportedType(String),

    /// Stored path escapes the media root.
    #[error("invalid media path: {0}")]
    InvalidPath(String),

    /// Filesystem operation failed.
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Media root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an uploaded image and return its media-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Empty`] or [`MediaError::UnsupportedType`] for
    /// unacceptable uploads, [`MediaError::Io`] if the write fails.
    pub async fn save_product_image(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let extension = image_extension(file_name)?;

        let dir = self.root.join(PRODUCT_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(dir.join(&name), bytes).await?;

        Ok(format!("{PRODUCT_DIR}/{name}"))
    }

    /// Remove a stored file. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::InvalidPath`] for paths outside the media root,
    /// [`MediaError::Io`] if the removal fails.
    pub async fn remove(&self, relative: &str) -> Result<(), MediaError> {
        let full = self.resolve(relative)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove several files, logging failures instead of returning them.
    pub async fn remove_all(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.remove(path).await {
                tracing::warn!(path = %path, error = %err, "Failed to remove media file");
            }
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

/// Lowercased extension of `file_name`, if it is an accepted image type.
fn image_extension(file_name: &str) -> Result<String, MediaError> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| MediaError::UnsupportedType(file_name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_store() -> MediaStore {
        MediaStore::new(std::env::temp_dir().join(format!("piffy-media-{}", Uuid::new_v4())))
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("Fox Print.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("owl.webp").unwrap(), "webp");
        assert!(image_extension("notes.txt").is_err());
        assert!(image_extension("no-extension").is_err());
    }

    #[test]
    fn test_resolve_rejects_escaping_paths() {
        let store = MediaStore::new("media");
        assert!(store.resolve("products/a.jpg").is_ok());
        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let store = temp_store();

        let path = store.save_product_image("fox.png", b"\x89PNG").await.unwrap();
        assert!(path.starts_with("products/"));
        assert!(path.ends_with(".png"));
        assert!(store.root().join(&path).exists());

        store.remove(&path).await.unwrap();
        assert!(!store.root().join(&path).exists());

        // Second removal is a no-op
        store.remove(&path).await.unwrap();

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_empty_upload() {
        let store = temp_store();
        let result = store.save_product_image("fox.png", b"").await;
        assert!(matches!(result, Err(MediaError::Empty)));
    }
}
