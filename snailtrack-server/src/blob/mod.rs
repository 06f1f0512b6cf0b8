//! Uploaded image storage
//!
//! Stores raw upload bytes and hands back a public URL. The local store
//! writes under `<root>/images/` and the router serves that directory at
//! `/images`.

use async_trait::async_trait;
use serde::Serialize;
use snailtrack_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// URLs of a stored upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredBlob {
    pub url: String,
    /// No thumbnailing yet; same as `url`
    pub thumbnail_url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a unique name derived from `filename`
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<StoredBlob>;
}

/// Filesystem-backed blob store
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<StoredBlob> {
        let name = unique_name(filename)?;
        let path = self.dir.join(&name);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored upload");

        let url = format!("{}/images/{}", self.public_base_url, name);
        Ok(StoredBlob {
            thumbnail_url: url.clone(),
            url,
        })
    }
}

/// `<stem>-<random>.<ext>` from the basename of `filename`
///
/// Directory components are discarded and only ASCII alphanumerics, `-`
/// and `_` survive in the stem and extension.
fn unique_name(filename: &str) -> Result<String> {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let stem = sanitize(stem);
    let ext = ext.map(sanitize).filter(|e| !e.is_empty());
    if stem.is_empty() && ext.is_none() {
        return Err(Error::InvalidInput(format!("Unusable filename '{}'", filename)));
    }

    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    let suffix = &Uuid::new_v4().simple().to_string()[..8];

    Ok(match ext {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_ascii_lowercase()),
        None => format!("{}-{}", stem, suffix),
    })
}

fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_keeps_stem_and_extension() {
        let name = unique_name("shelly.JPG").unwrap();
        assert!(name.starts_with("shelly-"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), "shelly-".len() + 8 + ".jpg".len());
    }

    #[test]
    fn test_unique_name_strips_directories() {
        let name = unique_name("../../etc/passwd").unwrap();
        assert!(name.starts_with("passwd-"));
        assert!(!name.contains('/'));

        let name = unique_name("C:\\photos\\my snail.png").unwrap();
        assert!(name.starts_with("mysnail-"));
    }

    #[test]
    fn test_unique_name_is_random() {
        assert_ne!(unique_name("a.jpg").unwrap(), unique_name("a.jpg").unwrap());
    }

    #[test]
    fn test_unique_name_rejects_empty() {
        assert!(unique_name("").is_err());
        assert!(unique_name("../").is_err());
        assert!(unique_name("!!!").is_err());
    }

    #[test]
    fn test_dotfile_becomes_stem() {
        let name = unique_name(".hidden").unwrap();
        assert!(name.starts_with("hidden-"));
    }

    #[tokio::test]
    async fn test_store_writes_file_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("images"), "http://localhost:5780/");

        let blob = store.store("snail.jpg", b"\xff\xd8\xff").await.unwrap();
        assert!(blob.url.starts_with("http://localhost:5780/images/snail-"));
        assert_eq!(blob.url, blob.thumbnail_url);

        let name = blob.url.rsplit('/').next().unwrap();
        let written = std::fs::read(store.dir().join(name)).unwrap();
        assert_eq!(written, b"\xff\xd8\xff");
    }
}
