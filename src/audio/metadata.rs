use std::fs;
use std::path::{Path, PathBuf};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use crate::{PlaylistError, Result, Song, SongMetadata};
use crate::utils::file_ops::{file_id, modified_ms};
use crate::utils::parallel::ParallelProcessor;
use rayon::prelude::*;

pub struct MetadataExtractor;

impl ParallelProcessor for MetadataExtractor {}

impl MetadataExtractor {
    pub fn extract_metadata(path: impl AsRef<Path>) -> Result<SongMetadata> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| PlaylistError::Metadata(e.to_string()))?;

        let mut metadata = SongMetadata::default();

        if let Some(track) = probed.format.default_track() {
            let params = &track.codec_params;
            if let (Some(time_base), Some(n_frames)) = (params.time_base, params.n_frames) {
                let time = time_base.calc_time(n_frames);
                metadata.length = time.seconds as f64 + time.frac;
            }
        }

        // ID3 tags show up at probe level, container tags on the format reader
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            apply_tags(&mut metadata, revision);
        }
        if let Some(revision) = probed.format.metadata().current() {
            apply_tags(&mut metadata, revision);
        }

        Ok(metadata)
    }

    /// Build a song for `path`. Files symphonia cannot read still load, titled after
    /// their file name.
    pub fn read_song(path: impl AsRef<Path>) -> Result<Song> {
        let path = path.as_ref();
        let stat = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PlaylistError::FileNotFound(path.to_path_buf()),
            _ => e.into(),
        })?;

        let metadata = Self::extract_metadata(path).unwrap_or_else(|e| {
            log::warn!("unable to read tags from {}: {}", path.display(), e);
            Self::fallback_metadata(path)
        });

        Ok(Song::new(path, file_id(path, &stat), modified_ms(&stat), metadata))
    }

    pub fn fallback_metadata(path: &Path) -> SongMetadata {
        SongMetadata {
            title: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
    }

    /// Audio files under `dir`, recursively, in walk order.
    pub fn collect_audio_files(dir_path: &Path, extensions: &[String], exclude: &[PathBuf]) -> Result<Vec<PathBuf>> {
        if !dir_path.exists() {
            return Err(PlaylistError::PathNotFound(dir_path.to_path_buf()));
        }

        let files = walkdir::WalkDir::new(dir_path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !exclude.iter().any(|x| e.path().starts_with(x)))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("error accessing entry: {}", err);
                    None
                }
            })
            .filter(|e| {
                let is_file = e.file_type().is_file();
                let has_valid_ext = Self::has_extension(e.path(), extensions);
                if is_file && !has_valid_ext {
                    log::debug!("skipping non-audio file: {}", e.path().display());
                }
                is_file && has_valid_ext
            })
            .map(|e| e.into_path())
            .collect();

        Ok(files)
    }

    /// Scan every directory and read all songs in parallel.
    pub fn process_directories(dirs: &[impl AsRef<Path>], extensions: &[String]) -> Result<Vec<Song>> {
        Self::init_parallel_processing();
        let mut all_songs = Vec::new();

        for dir in dirs {
            log::info!("processing directory: {}", dir.as_ref().display());
            let songs = Self::process_directory(dir, extensions)?;
            log::info!("found {} audio files in directory", songs.len());
            all_songs.extend(songs);
        }

        Ok(all_songs)
    }

    pub fn process_directory(dir: impl AsRef<Path>, extensions: &[String]) -> Result<Vec<Song>> {
        let dir_ref = dir.as_ref();
        let dir_path = fs::canonicalize(dir_ref).unwrap_or_else(|_| dir_ref.to_path_buf());

        let entries = Self::collect_audio_files(&dir_path, extensions, &[])?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let progress = Self::get_progress_counter();
        let total_files = entries.len();

        let songs = entries
            .par_iter()
            .map(|path| {
                let result = Self::read_song(path);

                let processed = progress.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if processed % 100 == 0 || processed == total_files {
                    log::info!(
                        "progress: {}/{} files ({:.1}%)",
                        processed,
                        total_files,
                        (processed as f64 / total_files as f64) * 100.0
                    );
                }

                result
            })
            .filter_map(|result| match result {
                Ok(song) => Some(song),
                Err(e) => {
                    log::warn!("error processing file: {}", e);
                    None
                }
            })
            .collect();

        Ok(songs)
    }
}

fn apply_tags(metadata: &mut SongMetadata, revision: &MetadataRevision) {
    for tag in revision.tags() {
        match tag.std_key {
            Some(StandardTagKey::Artist) => metadata.artist = tag.value.to_string(),
            Some(StandardTagKey::TrackTitle) => metadata.title = tag.value.to_string(),
            Some(StandardTagKey::Album) => metadata.album = tag.value.to_string(),
            Some(StandardTagKey::TrackNumber) => {
                // "3/12" style values carry the total after the slash
                let value = tag.value.to_string();
                if let Some(track) = value.split('/').next().and_then(|n| n.trim().parse().ok()) {
                    metadata.track = track;
                }
            }
            _ => {}
        }
    }
}
