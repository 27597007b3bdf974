use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::{FileId, PlaylistError, Result};

/// Identity of a file as last seen on disk: which file it is and when it changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileIdentity {
    pub inode: u64,
    pub modified_ms: f64,
}

impl FileIdentity {
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        let metadata = fs::metadata(path.as_ref())?;
        Ok(Self {
            inode: inode(&metadata),
            modified_ms: modified_ms(&metadata),
        })
    }
}

#[cfg(unix)]
fn inode(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode(_metadata: &fs::Metadata) -> u64 {
    0
}

pub fn modified_ms(metadata: &fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
}

/// Stable identity for a file: the inode on Unix, so it survives renames; the
/// canonical path elsewhere.
pub fn file_id(path: &Path, metadata: &fs::Metadata) -> FileId {
    if cfg!(unix) {
        FileId::new(inode(metadata).to_string())
    } else {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        FileId::new(canonical.to_string_lossy().into_owned())
    }
}

/// Replaces files without ever leaving a half-written one behind.
///
/// Content goes to a temporary file next to the target, is synced, and is then
/// renamed over it. The previous content is kept as `<name>.bak`.
pub struct SafeWriter;

impl SafeWriter {
    /// Write `bytes` to `target`. When `expected` is given and the file on disk no
    /// longer matches it, someone else changed the file and nothing is written.
    pub fn write(target: impl AsRef<Path>, bytes: &[u8], expected: Option<FileIdentity>) -> Result<FileIdentity> {
        let target = target.as_ref();

        if let Some(expected) = expected {
            match FileIdentity::of(target) {
                Ok(current) if current == expected => {}
                Ok(_) => return Err(PlaylistError::ConcurrentModification(target.to_path_buf())),
                Err(PlaylistError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let temp = sibling(target, ".tmp");
        {
            let mut file = File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        if target.exists() {
            fs::copy(target, sibling(target, ".bak"))?;
        }

        if let Err(e) = fs::rename(&temp, target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        log::debug!("wrote {} ({} bytes)", target.display(), bytes.len());
        FileIdentity::of(target)
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    target.with_file_name(name)
}

pub struct FileManager {
    root: PathBuf,
}

impl FileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rename `file_path` to `new_name` inside the same directory.
    ///
    /// If the name is taken by another file, `_1`, `_2`, … is appended to the stem
    /// until a free name is found. Returns the final path.
    pub fn rename_in_place(&self, file_path: impl AsRef<Path>, new_name: &str) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let dir = file_path.parent().unwrap_or(&self.root);

        let destination = dir.join(new_name);
        if destination == file_path {
            return Ok(destination);
        }

        let destination = if destination.exists() {
            let candidate = Path::new(new_name);
            let file_stem = candidate.file_stem().and_then(|s| s.to_str()).unwrap_or("renamed");
            let extension = candidate.extension().and_then(|ext| ext.to_str());

            let name_for = |counter: u32| match extension {
                Some(ext) => format!("{}_{}.{}", file_stem, counter, ext),
                None => format!("{}_{}", file_stem, counter),
            };

            let mut counter = 1;
            while dir.join(name_for(counter)).exists() {
                counter += 1;
            }
            dir.join(name_for(counter))
        } else {
            destination
        };

        fs::rename(file_path, &destination)?;
        log::info!("renamed {} -> {}", file_path.display(), destination.display());
        Ok(destination)
    }
}
