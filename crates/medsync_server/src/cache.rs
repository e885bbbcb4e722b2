//! Records directory: one XML document per patient.

use crate::error::{ServerError, ServerResult};
use medsync_protocol::{Record, RecordCodec};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Read/write-through document cache backing the socket binding.
#[derive(Debug, Clone)]
pub struct RecordCache {
    dir: PathBuf,
}

impl RecordCache {
    /// Opens a cache, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> ServerResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ServerError::startup("socket", format!("records dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a patient, or `None` if the id cannot name a file.
    pub fn path_for(&self, patient_id: &str) -> Option<PathBuf> {
        let usable = !patient_id.is_empty()
            && !patient_id.starts_with('.')
            && !patient_id
                .chars()
                .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());
        usable.then(|| self.dir.join(format!("{patient_id}.xml")))
    }

    /// Writes a record's document, replacing any previous one.
    pub async fn store(&self, record: &Record) -> ServerResult<PathBuf> {
        let path = self.path_for(record.patient_id()).ok_or_else(|| {
            std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("patient id '{}' cannot name a file", record.patient_id()),
            )
        })?;
        // One temp file per write, so concurrent stores never share a path.
        let tmp = path.with_extension(format!("xml.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, RecordCodec::encode_document(record)).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), "record cached");
        Ok(path)
    }

    /// Reads and decodes a cached record, if one exists.
    pub async fn load(&self, patient_id: &str) -> ServerResult<Option<Record>> {
        let Some(path) = self.path_for(patient_id) else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(xml) => Ok(Some(RecordCodec::decode_str(&xml)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_testkit::{record_for, sample_record};

    #[tokio::test]
    async fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path().join("records")).await.unwrap();

        let record = sample_record();
        let path = cache.store(&record).await.unwrap();
        assert_eq!(path, dir.path().join("records").join("PAT001.xml"));
        assert_eq!(cache.load("PAT001").await.unwrap(), Some(record));
        assert_eq!(cache.load("PAT404").await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).await.unwrap();

        let mut record = record_for("PAT5");
        cache.store(&record).await.unwrap();
        record.patient.last_name = "Updated".into();
        cache.store(&record).await.unwrap();

        let loaded = cache.load("PAT5").await.unwrap().unwrap();
        assert_eq!(loaded.patient.last_name, "Updated");
    }

    #[tokio::test]
    async fn concurrent_stores_of_one_patient() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).await.unwrap();

        let writes: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                let mut record = record_for("PAT6");
                record.patient.last_name = format!("Writer{i}");
                tokio::spawn(async move { cache.store(&record).await })
            })
            .collect();
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let loaded = cache.load("PAT6").await.unwrap().unwrap();
        assert!(loaded.patient.last_name.starts_with("Writer"));
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).await.unwrap();

        for id in ["../escape", "a/b", "..", ".hidden", ""] {
            assert!(cache.path_for(id).is_none(), "{id:?}");
            assert_eq!(cache.load(id).await.unwrap(), None);
        }
        assert!(cache.store(&record_for("../escape")).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_document_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("PAT9.xml"), "<medicalRecord>").unwrap();
        assert!(matches!(
            cache.load("PAT9").await,
            Err(ServerError::Protocol(_))
        ));
    }
}
