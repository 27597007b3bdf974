use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

pub mod audio;
pub mod cli;
pub mod config;
pub mod playlist;
pub mod query;
pub mod utils;

use query::{FieldKey, PropertyValue, Searchable, SortKey};

/// Stable per-file identity. On Unix this is the inode number, so it survives renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Tag data cached per file id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds.
    pub length: f64,
    pub plays: u32,
    pub track: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Song {
    pub path: PathBuf,
    pub fid: FileId,
    /// Modification time in milliseconds since the epoch.
    pub modified_ms: f64,
    pub metadata: SongMetadata,
    pub tags: Vec<String>,
    #[serde(skip)]
    filter_tokens: Vec<String>,
}

impl Song {
    pub fn new(path: impl Into<PathBuf>, fid: FileId, modified_ms: f64, metadata: SongMetadata) -> Self {
        let mut song = Self {
            path: path.into(),
            fid,
            modified_ms,
            metadata,
            tags: Vec::new(),
            filter_tokens: Vec::new(),
        };
        song.rebuild_tokens();
        song
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(|t| t.into().to_lowercase()).collect();
        self.rebuild_tokens();
        self
    }

    pub fn set_metadata(&mut self, metadata: SongMetadata) {
        self.metadata = metadata;
        self.rebuild_tokens();
    }

    /// Point the song at a new filename without touching the file on disk.
    pub fn rename_shallow(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn has_path(&self, path: &Path) -> bool {
        self.path == path
    }

    fn rebuild_tokens(&mut self) {
        let m = &self.metadata;
        let mut tokens = vec![
            m.title.to_lowercase(),
            m.artist.to_lowercase(),
            m.album.to_lowercase(),
            m.length.to_string(),
            m.plays.to_string(),
            m.track.to_string(),
        ];
        tokens.extend(self.tags.iter().cloned());
        self.filter_tokens = tokens;
    }
}

impl Searchable for Song {
    fn field(&self, key: FieldKey) -> Option<&str> {
        match key {
            FieldKey::Id | FieldKey::Fid => Some(self.fid.as_str()),
            FieldKey::Artist => Some(&self.metadata.artist),
            FieldKey::Album => Some(&self.metadata.album),
            FieldKey::Title => Some(&self.metadata.title),
        }
    }

    fn search_tokens(&self) -> &[String] {
        &self.filter_tokens
    }

    fn property(&self, key: SortKey) -> PropertyValue {
        match key {
            SortKey::Plays => PropertyValue::Number(self.metadata.plays as f64),
            SortKey::Artist => PropertyValue::Text(self.metadata.artist.clone()),
            SortKey::Title => PropertyValue::Text(self.metadata.title.clone()),
            SortKey::Album => PropertyValue::Text(self.metadata.album.clone()),
            SortKey::Modified => PropertyValue::Timestamp(self.modified_ms),
            SortKey::Track => PropertyValue::Number(self.metadata.track as f64),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Metadata extraction error: {0}")]
    Metadata(String),
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("{0} was modified by another process")]
    ConcurrentModification(PathBuf),
    #[error("a playlist load is already in progress")]
    LoadInProgress,
    #[error("no playlist named '{0}'")]
    PlaylistNotFound(String),
    #[error("unable to resolve a data directory")]
    DataDirUnavailable,
}

pub type Result<T> = std::result::Result<T, PlaylistError>;

// Re-exports for convenience
pub use audio::cache::MetadataCache;
pub use audio::metadata::MetadataExtractor;
pub use config::Config;
pub use playlist::{LoadState, Playlist, PlaylistEvent};
pub use playlist::definition::{PathEntry, PlaylistDefinition, PlaylistEntry};
pub use playlist::loader::PlaylistLoader;
pub use playlist::store::PlaylistStore;
pub use query::{extract_sort, matches, SortDirective, SortOrder};
