use std::path::PathBuf;

use anyhow::Context;
use rand::{Rng, distributions::Alphanumeric};

use crate::error::{ApiError, ApiResult};

/// Accepted hero/profile image formats.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
}

impl ImageType {
    pub fn from_content_type(value: &str) -> Option<Self> {
        match value {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        match name.rsplit('.').next() {
            Some("png") => Some(Self::Png),
            Some("jpeg") | Some("jpg") => Some(Self::Jpeg),
            Some("gif") => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }
}

/// Blob store for image files, all under one directory. Filenames are
/// generated here; callers only ever hand back names this store produced.
#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> ApiResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating image directory {}", self.root.display()))?;
        Ok(())
    }

    /// Writes the blob under a fresh random filename and returns the name.
    pub async fn write(&self, image_type: ImageType, data: &[u8]) -> ApiResult<String> {
        let stem: String =
            rand::thread_rng().sample_iter(&Alphanumeric).take(10).map(char::from).collect();
        let filename = format!("{stem}.{}", image_type.extension());
        tokio::fs::write(self.path(&filename)?, data)
            .await
            .with_context(|| format!("writing image {filename}"))?;
        Ok(filename)
    }

    pub async fn read(&self, filename: &str) -> ApiResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(filename)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("reading image {filename}"))
                .into()),
        }
    }

    pub async fn delete(&self, filename: &str) -> ApiResult<()> {
        tokio::fs::remove_file(self.path(filename)?)
            .await
            .with_context(|| format!("deleting image {filename}"))?;
        Ok(())
    }

    fn path(&self, filename: &str) -> ApiResult<PathBuf> {
        // Stored names never contain separators; reject anything else.
        if filename.contains(['/', '\\']) || filename.contains("..") {
            return Err(ApiError::validation("invalid image filename"));
        }
        Ok(self.root.join(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_map_both_ways() {
        assert_eq!(ImageType::from_content_type("image/png"), Some(ImageType::Png));
        assert_eq!(ImageType::from_content_type("image/jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_content_type("image/gif"), Some(ImageType::Gif));
        assert_eq!(ImageType::from_content_type("image/webp"), None);
        assert_eq!(ImageType::from_content_type("text/plain"), None);

        assert_eq!(ImageType::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageType::from_filename("a1b2c3.jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_filename("photo.jpg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_filename("noext"), None);
    }

    #[tokio::test]
    async fn write_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let filename = store.write(ImageType::Png, b"not really a png").await.unwrap();
        assert!(filename.ends_with(".png"));

        let bytes = store.read(&filename).await.unwrap().unwrap();
        assert_eq!(bytes, b"not really a png");

        store.delete(&filename).await.unwrap();
        assert!(store.read(&filename).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_image_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(store.read("ghost.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.delete("a/b.png").await.is_err());
    }
}
