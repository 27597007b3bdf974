//! Filesystem watching for playlist sources.
//!
//! Raw `notify` events are narrowed to audio files and turned into
//! [`WatchEvent`]s, delivered on a crossbeam channel.

use std::path::{Path, PathBuf};
use crossbeam::channel::{self, Receiver};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use crate::audio::metadata::MetadataExtractor;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    /// Contents or name changed; renames report the new path.
    Changed(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Added(p) | WatchEvent::Changed(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Map one `notify` event to the audio file events it implies.
pub fn translate(event: &Event, extensions: &[String]) -> Vec<WatchEvent> {
    let audio: Vec<&PathBuf> = event
        .paths
        .iter()
        .filter(|p| MetadataExtractor::has_extension(p, extensions))
        .collect();

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            audio.into_iter().cloned().map(WatchEvent::Added).collect()
        }
        EventKind::Remove(_) => audio.into_iter().cloned().map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            audio.into_iter().cloned().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths are [from, to]
            let mut out = Vec::new();
            if let Some(to) = event.paths.get(1) {
                if MetadataExtractor::has_extension(to, extensions) {
                    out.push(WatchEvent::Changed(to.clone()));
                } else if let Some(from) = event.paths.first().filter(|p| MetadataExtractor::has_extension(p, extensions)) {
                    out.push(WatchEvent::Removed(from.clone()));
                }
            }
            out
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => audio.into_iter().cloned().map(WatchEvent::Changed).collect(),
        _ => Vec::new(),
    }
}

/// Watches a set of directories recursively.
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<WatchEvent>,
}

impl LibraryWatcher {
    pub fn start(paths: &[PathBuf], extensions: Vec<String>) -> Result<Self> {
        let (tx, rx) = channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event, &extensions) {
                    if tx.send(change).is_err() {
                        return;
                    }
                }
            }
            Err(e) => log::warn!("watch error: {}", e),
        })?;

        for path in paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
            log::info!("now watching: {}", path.display());
        }

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<WatchEvent> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use pretty_assertions::assert_eq;

    fn exts() -> Vec<String> {
        vec!["mp3".into()]
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths.iter().fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn creations_and_removals_of_audio_files() {
        let created = event(EventKind::Create(CreateKind::File), &["/m/a.mp3", "/m/notes.txt"]);
        assert_eq!(translate(&created, &exts()), vec![WatchEvent::Added("/m/a.mp3".into())]);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/m/a.MP3"]);
        assert_eq!(translate(&removed, &exts()), vec![WatchEvent::Removed("/m/a.MP3".into())]);
    }

    #[test]
    fn renames_report_the_new_path() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/m/old.mp3", "/m/new.mp3"],
        );
        assert_eq!(translate(&renamed, &exts()), vec![WatchEvent::Changed("/m/new.mp3".into())]);

        let away = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/m/old.mp3", "/m/old.mp3.part"],
        );
        assert_eq!(translate(&away, &exts()), vec![WatchEvent::Removed("/m/old.mp3".into())]);
    }

    #[test]
    fn files_moved_in_are_added() {
        let moved_in = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/m/new.mp3"]);
        assert_eq!(translate(&moved_in, &exts()), vec![WatchEvent::Added("/m/new.mp3".into())]);

        let moved_out = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/m/old.mp3"]);
        assert_eq!(translate(&moved_out, &exts()), vec![WatchEvent::Removed("/m/old.mp3".into())]);
    }

    #[test]
    fn content_changes_but_not_attribute_changes() {
        let written = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/m/a.mp3"]);
        assert_eq!(translate(&written, &exts()), vec![WatchEvent::Changed("/m/a.mp3".into())]);

        let touched = event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)), &["/m/a.mp3"]);
        assert!(translate(&touched, &exts()).is_empty());
    }
}
