//! Playlist state: the loaded songs and the views derived from them.
//!
//! `songs` holds everything the playlist's sources produced, in load or sort order.
//! `filtered` is the subset matching the applied filter and `visible` the part of
//! that also matching the preview filter. Both are kept in `songs` order. When
//! shuffle is on, `shuffle` is a permutation of positions in `filtered`.

pub mod definition;
pub mod events;
pub mod loader;
pub mod store;
mod traversal;

use std::collections::HashMap;
use std::mem;
use std::path::Path;

use crossbeam::channel::Receiver;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::query::{extract_sort, matches, merge_sorted, Searchable, SortOrder};
use crate::{FileId, PlaylistError, Result, Song};
use definition::{PlaylistDefinition, PlaylistEntry};
use events::EventBus;
pub use events::PlaylistEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Loaded,
}

/// Ties metadata results to the load that asked for them. Results carrying the
/// ticket of an earlier load are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// Outcome for one source file of a load.
#[derive(Debug)]
pub struct Resolved {
    /// Position of the file among the load's sources; fixes the natural order.
    pub rank: usize,
    /// Definition entry the file came from.
    pub entry: Option<usize>,
    /// `None` when the file could not be turned into a song.
    pub song: Option<Song>,
}

#[derive(Debug)]
struct PendingLoad {
    expected: usize,
    resolved: usize,
    ranks: HashMap<FileId, usize>,
}

#[derive(Debug)]
pub struct Playlist {
    name: String,
    definition: Option<PlaylistDefinition>,
    songs: Vec<Song>,
    filtered: Vec<FileId>,
    visible: Vec<FileId>,
    shuffle: Option<Vec<usize>>,
    selection: Vec<FileId>,
    entry_filters: Vec<String>,
    default_sort: SortOrder,
    sort: SortOrder,
    filter: String,
    applied: Option<String>,
    preview: String,
    state: LoadState,
    generation: u64,
    pending: Option<PendingLoad>,
    reset_deferred: bool,
    deferred_songs: Vec<(Song, Option<usize>)>,
    events: EventBus,
    rng: StdRng,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic shuffles, for tests and reproducible listings.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            name: String::new(),
            definition: None,
            songs: Vec::new(),
            filtered: Vec::new(),
            visible: Vec::new(),
            shuffle: None,
            selection: Vec::new(),
            entry_filters: Vec::new(),
            default_sort: SortOrder::Natural,
            sort: SortOrder::Natural,
            filter: String::new(),
            applied: None,
            preview: String::new(),
            state: LoadState::Empty,
            generation: 0,
            pending: None,
            reset_deferred: false,
            deferred_songs: Vec::new(),
            events: EventBus::default(),
            rng,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PlaylistEvent> {
        self.events.subscribe()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn definition(&self) -> Option<&PlaylistDefinition> {
        self.definition.as_ref()
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn filtered_ids(&self) -> &[FileId] {
        &self.filtered
    }

    pub fn visible_ids(&self) -> &[FileId] {
        &self.visible
    }

    pub fn filtered_songs(&self) -> Vec<&Song> {
        self.filtered.iter().filter_map(|fid| self.get(fid)).collect()
    }

    /// What a listing should show: the filtered songs narrowed by the preview filter.
    pub fn visible_songs(&self) -> Vec<&Song> {
        self.visible.iter().filter_map(|fid| self.get(fid)).collect()
    }

    /// The applied filter without its `sort:` clauses.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn sort_order(&self) -> &SortOrder {
        &self.sort
    }

    pub fn get(&self, fid: &FileId) -> Option<&Song> {
        self.songs.iter().find(|s| &s.fid == fid)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Song> {
        self.songs.iter().find(|s| s.has_path(path))
    }

    fn position(&self, fid: &FileId) -> Option<usize> {
        self.songs.iter().position(|s| &s.fid == fid)
    }

    fn filtered_position(&self, fid: &FileId) -> Option<usize> {
        self.filtered.iter().position(|f| f == fid)
    }

    /// Index of the definition entry a file belongs to.
    pub fn entry_for(&self, path: &Path) -> Option<usize> {
        self.definition.as_ref().and_then(|d| d.entry_for(path))
    }

    fn passes_permanent(&self, song: &Song, entry: Option<usize>) -> bool {
        entry
            .and_then(|e| self.entry_filters.get(e))
            .map_or(true, |filter| matches(song, filter))
    }

    /// Clear everything. While a load is in flight the reset is deferred until the
    /// load completes, and `false` is returned.
    pub fn reset(&mut self) -> bool {
        if self.state == LoadState::Loading {
            log::debug!("reset of '{}' deferred until its load completes", self.name);
            self.reset_deferred = true;
            return false;
        }

        self.name.clear();
        self.definition = None;
        self.songs.clear();
        self.filtered.clear();
        self.visible.clear();
        if let Some(order) = self.shuffle.as_mut() {
            order.clear();
        }
        self.selection.clear();
        self.entry_filters.clear();
        self.default_sort = SortOrder::Natural;
        self.sort = SortOrder::Natural;
        self.filter.clear();
        self.applied = None;
        self.preview.clear();
        self.state = LoadState::Empty;
        self.generation += 1;
        self.pending = None;
        self.deferred_songs.clear();
        self.events.emit(PlaylistEvent::Reset);
        true
    }

    /// Start loading `definition`; `expected` is the number of source files whose
    /// results will be delivered.
    pub fn begin_load(&mut self, definition: PlaylistDefinition, expected: usize) -> Result<LoadTicket> {
        if self.state == LoadState::Loading {
            return Err(PlaylistError::LoadInProgress);
        }

        self.reset();
        self.generation += 1;
        self.state = LoadState::Loading;

        self.entry_filters.clear();
        for item in &definition.items {
            match item {
                PlaylistEntry::Path(entry) => {
                    let (residual, sort) = entry.split_filter();
                    if let Some(sort) = sort {
                        self.default_sort = SortOrder::By(sort);
                    }
                    self.entry_filters.push(residual);
                }
                PlaylistEntry::Song(_) => self.entry_filters.push(String::new()),
            }
        }
        self.sort = self.default_sort.clone();

        self.name = definition.name.clone();
        self.definition = Some(definition);
        self.pending = Some(PendingLoad {
            expected,
            resolved: 0,
            ranks: HashMap::new(),
        });

        log::info!("loading playlist '{}' ({} sources)", self.name, expected);
        self.events.emit(PlaylistEvent::LoadStart { name: self.name.clone() });

        let ticket = LoadTicket { generation: self.generation };
        if expected == 0 {
            self.finish_load();
        }
        Ok(ticket)
    }

    /// Hand over one resolved source. Results arrive in any order; the load finishes
    /// once every expected source has reported, whether or not it produced a song.
    /// Returns `false` when the ticket is stale.
    pub fn deliver(&mut self, ticket: LoadTicket, resolved: Resolved) -> bool {
        if ticket.generation != self.generation || self.state != LoadState::Loading {
            log::debug!("ignoring result for an abandoned load");
            return false;
        }

        let entry = resolved.entry;
        let keep = resolved
            .song
            .filter(|song| self.position(&song.fid).is_none() && self.passes_permanent(song, entry));

        let done = match self.pending.as_mut() {
            Some(pending) => {
                pending.resolved += 1;
                if let Some(song) = &keep {
                    pending.ranks.insert(song.fid.clone(), resolved.rank);
                }
                pending.resolved >= pending.expected
            }
            None => return false,
        };

        if let Some(song) = keep {
            self.songs.push(song);
        }

        if done {
            self.finish_load();
        }
        true
    }

    fn finish_load(&mut self) {
        if let Some(pending) = self.pending.take() {
            let ranks = pending.ranks;
            let songs = mem::take(&mut self.songs);
            self.songs = merge_sorted(songs, &|a: &Song, b: &Song| ranks.get(&a.fid) < ranks.get(&b.fid));
        }

        self.state = LoadState::Loaded;
        self.sort_songs();
        self.filtered = self.compute_filtered();
        self.refresh_shuffle();
        self.refresh_visible();

        log::info!("loaded playlist '{}': {} songs", self.name, self.songs.len());
        self.events.emit(PlaylistEvent::Load { songs: self.songs.len() });

        for (song, entry) in mem::take(&mut self.deferred_songs) {
            self.resort_song(song, entry);
        }

        if mem::take(&mut self.reset_deferred) {
            self.reset();
        }
    }

    fn compute_filtered(&self) -> Vec<FileId> {
        self.songs
            .iter()
            .filter(|song| self.filter.is_empty() || song.matches_filter(&self.filter))
            .map(|song| song.fid.clone())
            .collect()
    }

    fn refresh_visible(&mut self) {
        let (preview, _) = extract_sort(&self.preview);

        let visible = self
            .filtered
            .iter()
            .filter(|fid| {
                preview.is_empty() || self.get(fid).is_some_and(|song| matches(song, &preview))
            })
            .cloned()
            .collect();
        self.visible = visible;
    }

    fn refresh_shuffle(&mut self) {
        if self.shuffle.is_some() {
            self.shuffle_on();
        }
    }

    /// Commit a filter. `sort:` clauses in it set the order; without any the
    /// playlist falls back to its default order. Returns `false` when the text is
    /// the one already applied.
    pub fn apply_filter(&mut self, text: &str) -> bool {
        let text = text.to_lowercase();
        if self.applied.as_deref() == Some(text.as_str()) {
            return false;
        }

        let (residual, directive) = extract_sort(&text);
        let order = directive.map_or_else(|| self.default_sort.clone(), SortOrder::By);

        self.applied = Some(text);
        self.filter = residual.trim().to_string();

        if order != self.sort {
            self.sort = order;
            self.sort_songs();
        }

        self.filtered = self.compute_filtered();
        self.refresh_shuffle();
        self.refresh_visible();
        self.events.emit(PlaylistEvent::Change);
        true
    }

    /// Narrow the filtered songs without committing. Returns `false` when unchanged.
    pub fn preview_filter(&mut self, text: &str) -> bool {
        let text = text.to_lowercase();
        if text == self.preview {
            return false;
        }

        self.preview = text;
        self.refresh_visible();
        self.events.emit(PlaylistEvent::Change);
        true
    }

    pub fn set_sort(&mut self, order: SortOrder) {
        self.sort = order;
        self.sort_songs();
        self.refresh_visible();
        self.events.emit(PlaylistEvent::Change);
    }

    /// Stable re-sort of `songs` and `filtered` by the current order.
    fn sort_songs(&mut self) {
        if let SortOrder::By(directive) = &self.sort {
            let songs = mem::take(&mut self.songs);
            self.songs = merge_sorted(songs, &|a: &Song, b: &Song| directive.before(a, b));
        }

        let index: HashMap<&FileId, usize> = self
            .songs
            .iter()
            .enumerate()
            .map(|(i, song)| (&song.fid, i))
            .collect();
        let filtered = mem::take(&mut self.filtered);

        self.filtered = match &self.sort {
            SortOrder::Natural => merge_sorted(filtered, &|a: &FileId, b: &FileId| index.get(a) < index.get(b)),
            SortOrder::By(directive) => {
                let songs = &self.songs;
                merge_sorted(filtered, &|a: &FileId, b: &FileId| {
                    match (index.get(a), index.get(b)) {
                        (Some(&x), Some(&y)) => directive.before(&songs[x], &songs[y]),
                        _ => false,
                    }
                })
            }
        };
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle.is_some()
    }

    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle.as_deref()
    }

    /// Draw a fresh permutation of the filtered songs.
    pub fn shuffle_on(&mut self) {
        let mut order: Vec<usize> = (0..self.filtered.len()).collect();
        order.shuffle(&mut self.rng);
        self.shuffle = Some(order);
    }

    pub fn shuffle_off(&mut self) {
        self.shuffle = None;
    }

    fn insert_filtered(&mut self, at: usize, fid: FileId) {
        self.filtered.insert(at, fid);
        if let Some(order) = self.shuffle.as_mut() {
            for slot in order.iter_mut().filter(|slot| **slot >= at) {
                *slot += 1;
            }
            let position = self.rng.random_range(0..=order.len());
            order.insert(position, at);
        }
    }

    fn remove_filtered(&mut self, fid: &FileId) {
        let Some(at) = self.filtered_position(fid) else {
            return;
        };

        self.filtered.remove(at);
        if let Some(order) = self.shuffle.as_mut() {
            order.retain(|slot| *slot != at);
            for slot in order.iter_mut().filter(|slot| **slot > at) {
                *slot -= 1;
            }
        }
    }

    /// Add a song after loading, or put a changed one back in its sorted place.
    /// While loading, the song is queued and handled once the load completes.
    pub fn resort_song(&mut self, song: Song, entry: Option<usize>) {
        if self.state == LoadState::Loading {
            self.deferred_songs.push((song, entry));
            return;
        }

        let existing = self.position(&song.fid);
        if let Some(i) = existing {
            self.songs.remove(i);
            self.remove_filtered(&song.fid);
        }

        if !self.passes_permanent(&song, entry) {
            if existing.is_some() {
                self.selection.retain(|f| f != &song.fid);
                self.events.emit(PlaylistEvent::Remove { fid: song.fid.clone() });
            }
            self.refresh_visible();
            self.events.emit(PlaylistEvent::Change);
            return;
        }

        let at = match &self.sort {
            SortOrder::Natural => existing.unwrap_or(self.songs.len()),
            SortOrder::By(directive) => self
                .songs
                .iter()
                .position(|other| directive.before(&song, other))
                .unwrap_or(self.songs.len()),
        };

        let fid = song.fid.clone();
        let shown = self.filter.is_empty() || matches(&song, &self.filter);
        self.songs.insert(at, song);

        if shown {
            let index: HashMap<&FileId, usize> = self
                .songs
                .iter()
                .enumerate()
                .map(|(i, s)| (&s.fid, i))
                .collect();
            let slot = self
                .filtered
                .iter()
                .filter(|f| index.get(f).is_some_and(|&i| i < at))
                .count();
            self.insert_filtered(slot, fid.clone());
        }

        self.refresh_visible();
        if existing.is_none() {
            log::info!("song added to '{}': {}", self.name, fid);
            self.events.emit(PlaylistEvent::Add { fid });
        }
        self.events.emit(PlaylistEvent::Change);
    }

    fn detach(&mut self, fid: &FileId) -> Option<Song> {
        let i = self.position(fid)?;
        let song = self.songs.remove(i);
        self.remove_filtered(fid);
        self.visible.retain(|f| f != fid);
        self.selection.retain(|f| f != fid);
        self.events.emit(PlaylistEvent::Remove { fid: fid.clone() });
        Some(song)
    }

    /// Drop a song from the loaded state only (the file went away).
    pub fn remove_song(&mut self, fid: &FileId) -> Option<Song> {
        let song = self.detach(fid)?;
        self.events.emit(PlaylistEvent::Change);
        Some(song)
    }

    pub fn remove_by_path(&mut self, path: &Path) -> Option<Song> {
        let fid = self.find_by_path(path)?.fid.clone();
        self.remove_song(&fid)
    }

    /// Remove songs from the playlist itself: the definition forgets them too and is
    /// published as a `DefinitionUpdate`.
    pub fn remove_songs(&mut self, fids: &[FileId]) -> usize {
        let removed: Vec<Song> = fids.iter().filter_map(|fid| self.detach(fid)).collect();

        if let Some(definition) = self.definition.as_mut() {
            for song in &removed {
                definition.forget(&song.path);
            }
            let updated = definition.clone();
            self.events.emit(PlaylistEvent::DefinitionUpdate(updated));
        }

        self.events.emit(PlaylistEvent::Change);
        removed.len()
    }

    /// The file behind a song was renamed.
    pub fn rename_song(&mut self, fid: &FileId, path: impl AsRef<Path>) -> bool {
        let Some(i) = self.position(fid) else {
            return false;
        };

        let path = path.as_ref();
        let old = self.songs[i].path.clone();
        self.songs[i].rename_shallow(path);

        if let Some(definition) = self.definition.as_mut() {
            if definition.rename_file(&old, path) {
                let updated = definition.clone();
                self.events.emit(PlaylistEvent::DefinitionUpdate(updated));
            }
        }
        self.events.emit(PlaylistEvent::Change);
        true
    }

    /// Count a play; returns the new count.
    pub fn record_play(&mut self, fid: &FileId) -> Option<u32> {
        let i = self.position(fid)?;
        let mut metadata = self.songs[i].metadata.clone();
        metadata.plays += 1;
        self.songs[i].set_metadata(metadata);
        Some(self.songs[i].metadata.plays)
    }

    /// Move a song `delta` places within the filtered view, swapping neighbours in
    /// both the filtered view and the full list. Returns `false` if a boundary is
    /// reached first; swaps already made are kept.
    pub fn move_item(&mut self, fid: &FileId, delta: i32) -> bool {
        if delta == 0 {
            return true;
        }

        let completed = self.swap_steps(fid, delta);
        self.refresh_visible();
        if completed {
            self.events.emit(PlaylistEvent::Change);
        }
        completed
    }

    fn swap_steps(&mut self, fid: &FileId, delta: i32) -> bool {
        let forward = delta > 0;

        for _ in 0..delta.unsigned_abs() {
            let Some(i) = self.filtered_position(fid) else {
                return false;
            };

            let j = if forward {
                i + 1
            } else if i > 0 {
                i - 1
            } else {
                return false;
            };

            let Some(other) = self.filtered.get(j).cloned() else {
                return false;
            };

            self.filtered.swap(i, j);
            if let (Some(a), Some(b)) = (self.position(fid), self.position(&other)) {
                self.songs.swap(a, b);
            }
        }

        true
    }

    /// Move every selected song one block `direction` places, last one first when
    /// moving down. Stops at the first song that hits a boundary.
    pub fn move_selection(&mut self, direction: i32) -> bool {
        let mut selected: Vec<(usize, FileId)> = self
            .selection
            .iter()
            .filter_map(|fid| self.filtered_position(fid).map(|i| (i, fid.clone())))
            .collect();
        selected.sort_by_key(|(i, _)| *i);
        if direction > 0 {
            selected.reverse();
        }

        selected.iter().all(|(_, fid)| self.move_item(fid, direction))
    }

    /// Select a song; `exclusive` replaces the current selection.
    pub fn select(&mut self, fid: &FileId, exclusive: bool) -> bool {
        if self.position(fid).is_none() {
            return false;
        }

        if exclusive {
            self.selection.clear();
        }
        if !self.selection.contains(fid) {
            self.selection.push(fid.clone());
        }
        self.events.emit(PlaylistEvent::SelectionChange { selected: self.selection.len() });
        true
    }

    pub fn deselect(&mut self, fid: &FileId) -> bool {
        let before = self.selection.len();
        self.selection.retain(|f| f != fid);
        let changed = self.selection.len() != before;
        if changed {
            self.events.emit(PlaylistEvent::SelectionChange { selected: self.selection.len() });
        }
        changed
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.events.emit(PlaylistEvent::SelectionChange { selected: 0 });
    }

    pub fn selection(&self) -> &[FileId] {
        &self.selection
    }

    /// Selected songs in filtered order.
    pub fn selected_songs(&self) -> Vec<&Song> {
        self.filtered
            .iter()
            .filter(|fid| self.selection.contains(fid))
            .filter_map(|fid| self.get(fid))
            .collect()
    }
}
