use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use crate::utils::file_ops::{FileIdentity, SafeWriter};
use crate::{FileId, Result, SongMetadata};

/// Song metadata keyed by file id, persisted as one JSON object.
///
/// Lookups hit memory only; `flush` writes the file back when something changed.
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    entries: HashMap<FileId, SongMetadata>,
    identity: Option<FileIdentity>,
    dirty: bool,
}

impl MetadataCache {
    /// Open the cache at `path`, creating an empty one if the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            log::info!("creating metadata cache at {}", path.display());
            SafeWriter::write(&path, b"{}", None)?;
        }

        let text = fs::read_to_string(&path)?;
        let entries: HashMap<FileId, SongMetadata> = if text.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&text)?
        };
        log::debug!("metadata cache holds {} entries", entries.len());

        Ok(Self {
            identity: FileIdentity::of(&path).ok(),
            path,
            entries,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fid: &FileId) -> Option<&SongMetadata> {
        self.entries.get(fid)
    }

    pub fn insert(&mut self, fid: FileId, metadata: SongMetadata) {
        if self.entries.get(&fid) != Some(&metadata) {
            self.entries.insert(fid, metadata);
            self.dirty = true;
        }
    }

    /// Write pending changes. Fails with `ConcurrentModification` if another
    /// process rewrote the file since it was read.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let json = serde_json::to_vec(&self.entries)?;
        self.identity = Some(SafeWriter::write(&self.path, &json, self.identity)?);
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn creates_and_persists_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("songs.cache");

        let mut cache = MetadataCache::open(&path).unwrap();
        assert!(cache.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");

        let metadata = SongMetadata {
            title: "Da Funk".into(),
            plays: 4,
            ..Default::default()
        };
        cache.insert(FileId::new("12"), metadata.clone());
        cache.flush().unwrap();

        let reopened = MetadataCache::open(&path).unwrap();
        assert_eq!(reopened.get(&FileId::new("12")), Some(&metadata));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn reads_partial_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("songs.cache");
        fs::write(&path, r#"{"7":{"title":"Aerodynamic"}}"#).unwrap();

        let cache = MetadataCache::open(&path).unwrap();
        let entry = cache.get(&FileId::new("7")).unwrap();
        assert_eq!(entry.title, "Aerodynamic");
        assert_eq!(entry.plays, 0);
    }
}
