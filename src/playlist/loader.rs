//! Turns a playlist definition into songs.
//!
//! Source files are listed up front, then resolved on the rayon pool: cached
//! metadata is reused, anything else is read with symphonia. Results stream back
//! over a channel to the thread that owns the [`Playlist`], in whatever order they
//! finish.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use crossbeam::channel;
use crate::audio::cache::MetadataCache;
use crate::audio::metadata::MetadataExtractor;
use crate::audio::watch::WatchEvent;
use crate::playlist::definition::{PlaylistDefinition, PlaylistEntry};
use crate::playlist::{Playlist, Resolved};
use crate::utils::file_ops::{file_id, modified_ms};
use crate::utils::parallel::ParallelProcessor;
use crate::{FileId, PlaylistError, Result, Song, SongMetadata};

struct Job {
    rank: usize,
    entry: usize,
    path: PathBuf,
}

struct Outcome {
    rank: usize,
    entry: usize,
    song: Result<Song>,
    /// Metadata read from the file rather than the cache.
    fresh: Option<SongMetadata>,
}

pub struct PlaylistLoader<'a> {
    cache: &'a mut MetadataCache,
    extensions: Vec<String>,
}

impl ParallelProcessor for PlaylistLoader<'_> {}

impl<'a> PlaylistLoader<'a> {
    pub fn new(cache: &'a mut MetadataCache, extensions: Vec<String>) -> Self {
        Self { cache, extensions }
    }

    /// List every source file of `definition`, in definition order.
    fn plan(&self, definition: &PlaylistDefinition) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();

        for (entry, item) in definition.items.iter().enumerate() {
            match item {
                PlaylistEntry::Path(source) => {
                    let files = MetadataExtractor::collect_audio_files(&source.path, &self.extensions, &source.exclude)?;
                    log::debug!("{}: {} audio files", source.path.display(), files.len());
                    jobs.extend(files.into_iter().map(|path| Job { rank: 0, entry, path }));
                }
                PlaylistEntry::Song(song) => {
                    if !song.filename.is_file() {
                        return Err(PlaylistError::FileNotFound(song.filename.clone()));
                    }
                    jobs.push(Job {
                        rank: 0,
                        entry,
                        path: song.filename.clone(),
                    });
                }
            }
        }

        for (rank, job) in jobs.iter_mut().enumerate() {
            job.rank = rank;
        }
        Ok(jobs)
    }

    /// Load `definition` into `playlist`. Returns the number of songs loaded.
    ///
    /// Missing source directories or song files fail the load before it starts.
    /// Files that cannot be read once the load is underway are skipped.
    pub fn load(&mut self, playlist: &mut Playlist, definition: PlaylistDefinition) -> Result<usize> {
        Self::init_parallel_processing();

        let jobs = self.plan(&definition)?;
        let ticket = playlist.begin_load(definition, jobs.len())?;
        let cache: &MetadataCache = &*self.cache;
        let mut fresh = Vec::new();

        thread::scope(|scope| {
            let (tx, rx) = channel::unbounded();
            scope.spawn(move || Self::stream_results(jobs, |job| resolve(job, cache), tx));

            for outcome in rx {
                let song = match outcome.song {
                    Ok(song) => Some(song),
                    Err(e) => {
                        log::warn!("skipping source: {}", e);
                        None
                    }
                };

                if let (Some(song), Some(metadata)) = (&song, outcome.fresh) {
                    fresh.push((song.fid.clone(), metadata));
                }

                playlist.deliver(
                    ticket,
                    Resolved {
                        rank: outcome.rank,
                        entry: Some(outcome.entry),
                        song,
                    },
                );
            }
        });

        log::debug!("{} songs read from disk, the rest from cache", fresh.len());
        for (fid, metadata) in fresh {
            self.cache.insert(fid, metadata);
        }
        self.cache.flush()?;

        Ok(playlist.len())
    }

    /// Bring `playlist` up to date with one filesystem change.
    pub fn apply_watch_event(&mut self, playlist: &mut Playlist, event: &WatchEvent) -> Result<()> {
        let path = event.path();
        let stat = match event {
            WatchEvent::Removed(_) => None,
            WatchEvent::Added(_) | WatchEvent::Changed(_) => fs::metadata(path).ok(),
        };

        let Some(stat) = stat else {
            if let Some(song) = playlist.remove_by_path(path) {
                log::info!("removed {} from '{}'", song.path.display(), playlist.name());
            }
            return Ok(());
        };

        if !MetadataExtractor::has_extension(path, &self.extensions) {
            return Ok(());
        }

        let fid = file_id(path, &stat);
        let entry = playlist.entry_for(path);
        let known = playlist.get(&fid).cloned();

        match (known, entry) {
            (Some(_), None) => {
                log::info!("{} left the playlist's sources", path.display());
                playlist.remove_song(&fid);
            }
            (Some(song), Some(entry)) => {
                if !song.has_path(path) {
                    log::info!("renamed {} -> {}", song.path.display(), path.display());
                    playlist.rename_song(&fid, path);
                }

                let modified = modified_ms(&stat);
                if modified != song.modified_ms {
                    let mut metadata = read_metadata(path);
                    metadata.plays = song.metadata.plays;
                    self.cache.insert(fid.clone(), metadata.clone());
                    playlist.resort_song(Song::new(path, fid, modified, metadata), Some(entry));
                }
            }
            (None, Some(entry)) => {
                log::info!("{} joined '{}'", path.display(), playlist.name());
                let outcome = resolve(Job { rank: 0, entry, path: path.to_path_buf() }, self.cache);
                let song = outcome.song?;
                if let Some(metadata) = outcome.fresh {
                    self.cache.insert(song.fid.clone(), metadata);
                }
                playlist.resort_song(song, Some(entry));
            }
            (None, None) => log::debug!("ignoring change to {}", path.display()),
        }

        self.cache.flush()
    }

    /// Count a play of `fid` and persist the new count.
    pub fn record_play(&mut self, playlist: &mut Playlist, fid: &FileId) -> Result<Option<u32>> {
        let Some(plays) = playlist.record_play(fid) else {
            return Ok(None);
        };

        if let Some(song) = playlist.get(fid) {
            self.cache.insert(fid.clone(), song.metadata.clone());
            self.cache.flush()?;
        }
        Ok(Some(plays))
    }
}

fn read_metadata(path: &Path) -> SongMetadata {
    MetadataExtractor::extract_metadata(path).unwrap_or_else(|e| {
        log::warn!("unable to read tags from {}: {}", path.display(), e);
        MetadataExtractor::fallback_metadata(path)
    })
}

fn resolve(job: Job, cache: &MetadataCache) -> Outcome {
    let stat = match fs::metadata(&job.path) {
        Ok(stat) => stat,
        Err(_) => {
            return Outcome {
                rank: job.rank,
                entry: job.entry,
                song: Err(PlaylistError::FileNotFound(job.path)),
                fresh: None,
            }
        }
    };

    let fid = file_id(&job.path, &stat);
    let (metadata, fresh) = match cache.get(&fid) {
        Some(cached) => (cached.clone(), None),
        None => {
            let metadata = read_metadata(&job.path);
            (metadata.clone(), Some(metadata))
        }
    };

    Outcome {
        rank: job.rank,
        entry: job.entry,
        song: Ok(Song::new(job.path, fid, modified_ms(&stat), metadata)),
        fresh,
    }
}
