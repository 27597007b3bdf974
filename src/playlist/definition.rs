use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::query::{extract_sort, SortDirective};

/// A saved playlist: a name, a creation time and the sources its songs come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDefinition {
    pub name: String,
    /// Milliseconds since the epoch.
    pub created: i64,
    #[serde(default)]
    pub items: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PlaylistEntry {
    Song(SongEntry),
    Path(PathEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntry {
    pub filename: PathBuf,
}

/// A directory scanned recursively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathEntry {
    pub path: PathBuf,
    /// Permanent filter; may carry `sort:` clauses.
    pub filter: String,
    /// Default ordering, e.g. `artist,album,track`.
    pub sort: String,
    /// Files or directories under `path` to skip.
    pub exclude: Vec<PathBuf>,
}

impl PathEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn excludes(&self, file: &Path) -> bool {
        self.exclude
            .iter()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| file.starts_with(p))
    }

    /// The permanent filter without its `sort:` clauses, plus the entry's default order.
    /// An explicit `sort` field wins over a clause in the filter.
    pub fn split_filter(&self) -> (String, Option<SortDirective>) {
        let (residual, from_filter) = extract_sort(&self.filter);
        let explicit = SortDirective::parse(&self.sort);
        (residual, explicit.or(from_filter))
    }
}

impl PlaylistDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: chrono::Utc::now().timestamp_millis(),
            items: Vec::new(),
        }
    }

    pub fn with_path(mut self, entry: PathEntry) -> Self {
        self.items.push(PlaylistEntry::Path(entry));
        self
    }

    pub fn with_song(mut self, filename: impl Into<PathBuf>) -> Self {
        self.items.push(PlaylistEntry::Song(SongEntry {
            filename: filename.into(),
        }));
        self
    }

    /// Source directories, for watching.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PlaylistEntry::Path(p) => Some(p.path.clone()),
                PlaylistEntry::Song(_) => None,
            })
            .collect()
    }

    /// Index of the entry a file belongs to: an explicit song entry, or the first
    /// path entry containing it and not excluding it.
    pub fn entry_for(&self, file: &Path) -> Option<usize> {
        self.items.iter().position(|item| match item {
            PlaylistEntry::Song(s) => s.filename == file,
            PlaylistEntry::Path(p) => file.starts_with(&p.path) && !p.excludes(file),
        })
    }

    /// Follow a file rename in explicit song entries. Returns whether anything changed.
    pub fn rename_file(&mut self, from: &Path, to: &Path) -> bool {
        let mut changed = false;
        for item in &mut self.items {
            if let PlaylistEntry::Song(s) = item {
                if s.filename == from {
                    s.filename = to.to_path_buf();
                    changed = true;
                }
            }
        }
        changed
    }

    /// Drop a file from the definition: song entries are removed, files coming from
    /// a path entry are added to its exclude list.
    pub fn forget(&mut self, file: &Path) {
        self.items.retain(|item| !matches!(item, PlaylistEntry::Song(s) if s.filename == file));

        for item in &mut self.items {
            if let PlaylistEntry::Path(p) = item {
                if file.starts_with(&p.path) && !p.excludes(file) {
                    p.exclude.push(file.to_path_buf());
                }
            }
        }
    }
}
