//! Materialised binary resources.
//!
//! Audio responses are written to a temporary file and handed out as a
//! cheaply cloneable `MaterializedResource`. The file is deleted when the
//! last clone is dropped, so repeated voice interactions do not accumulate
//! files. Prescription documents are persisted under a deterministic name
//! in the download directory instead.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════
// MaterializedResource
// ═══════════════════════════════════════════════════════════

struct ResourceInner {
    id: Uuid,
    mime: &'static str,
    len: usize,
    path: TempPath,
}

impl Drop for ResourceInner {
    fn drop(&mut self) {
        tracing::debug!(id = %self.id, path = %self.path.display(), "Releasing resource");
    }
}

/// Reference-counted handle to bytes materialised on disk.
#[derive(Clone)]
pub struct MaterializedResource {
    inner: Arc<ResourceInner>,
}

impl MaterializedResource {
    /// Write `bytes` to a fresh temporary file.
    pub fn materialize(bytes: &[u8], suffix: &str, mime: &'static str) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("medipredict-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        let path = file.into_temp_path();
        let inner = ResourceInner {
            id: Uuid::new_v4(),
            mime,
            len: bytes.len(),
            path,
        };
        tracing::debug!(id = %inner.id, bytes = inner.len, mime, "Materialized resource");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Audio returned by the voice service (MPEG).
    pub fn audio(bytes: &[u8]) -> std::io::Result<Self> {
        Self::materialize(bytes, ".mp3", "audio/mpeg")
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Object-URL style identifier for front ends.
    pub fn url(&self) -> String {
        format!("blob:medipredict/{}", self.inner.id)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn mime(&self) -> &'static str {
        self.inner.mime
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }
}

impl std::fmt::Debug for MaterializedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializedResource")
            .field("id", &self.inner.id)
            .field("mime", &self.inner.mime)
            .field("len", &self.inner.len)
            .field("path", &self.inner.path.display())
            .finish()
    }
}

impl PartialEq for MaterializedResource {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

// ═══════════════════════════════════════════════════════════
// DocumentStore
// ═══════════════════════════════════════════════════════════

/// `prescription_<disease>.pdf`, with path separators neutralised.
pub fn prescription_file_name(disease: &str) -> String {
    let safe: String = disease
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("prescription_{safe}.pdf")
}

/// Directory that receives downloaded documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a document, replacing any previous file of the same name.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialized_audio_is_readable() {
        let resource = MaterializedResource::audio(b"ID3 data").unwrap();
        assert_eq!(std::fs::read(resource.path()).unwrap(), b"ID3 data");
        assert_eq!(resource.mime(), "audio/mpeg");
        assert_eq!(resource.len(), 8);
        assert!(resource.url().starts_with("blob:medipredict/"));
    }

    #[test]
    fn file_is_released_with_last_clone() {
        let resource = MaterializedResource::audio(b"abc").unwrap();
        let path = resource.path().to_path_buf();
        let clone = resource.clone();

        drop(resource);
        assert!(path.exists(), "still referenced by clone");

        drop(clone);
        assert!(!path.exists());
    }

    #[test]
    fn prescription_file_name_is_deterministic() {
        assert_eq!(prescription_file_name("Flu"), "prescription_Flu.pdf");
        assert_eq!(
            prescription_file_name("Common Cold"),
            "prescription_Common Cold.pdf"
        );
    }

    #[test]
    fn prescription_file_name_neutralises_separators() {
        assert_eq!(
            prescription_file_name("GERD/Reflux"),
            "prescription_GERD_Reflux.pdf"
        );
        assert_eq!(prescription_file_name("..\\x"), "prescription_.._x.pdf");
    }

    #[tokio::test]
    async fn document_store_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("downloads"));
        let path = store.save("prescription_Flu.pdf", b"%PDF").await.unwrap();
        assert_eq!(path, dir.path().join("downloads").join("prescription_Flu.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF");
    }
}
