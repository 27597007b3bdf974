use std::path::PathBuf;
use crate::{PlaylistError, Result};

pub const CACHE_FILE: &str = "songs.cache";
pub const PLAYLISTS_DIR: &str = "playlists";
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["mp3", "m4a"];

/// Where playlists and the metadata cache live, and which files count as audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub extensions: Vec<String>,
}

impl Config {
    /// Resolve the data directory: the given override, else the platform data
    /// directory plus `playlist-manager`.
    pub fn resolve(data_dir: Option<PathBuf>, extensions: Option<Vec<String>>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|d| d.join("playlist-manager"))
                .ok_or(PlaylistError::DataDirUnavailable)?,
        };

        let extensions = extensions
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect())
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        Ok(Self { data_dir, extensions })
    }

    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.data_dir.join(PLAYLISTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn override_and_extension_normalisation() {
        let config = Config::resolve(Some("/tmp/pm".into()), Some(vec![".MP3".into(), "flac".into()])).unwrap();
        assert_eq!(config.cache_file(), PathBuf::from("/tmp/pm/songs.cache"));
        assert_eq!(config.playlists_dir(), PathBuf::from("/tmp/pm/playlists"));
        assert_eq!(config.extensions, vec!["mp3", "flac"]);
    }

    #[test]
    fn empty_extension_list_means_defaults() {
        let config = Config::resolve(Some("/tmp/pm".into()), Some(Vec::new())).unwrap();
        assert_eq!(config.extensions, vec!["mp3", "m4a"]);
    }
}
