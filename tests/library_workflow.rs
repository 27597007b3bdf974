use std::fs;
use std::path::Path;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use playlist_manager::audio::watch::{translate, WatchEvent};
use playlist_manager::utils::file_ops::FileManager;
use playlist_manager::utils::rename::RenameRule;
use playlist_manager::{
    LoadState, MetadataCache, PathEntry, Playlist, PlaylistDefinition, PlaylistError, PlaylistEvent,
    PlaylistLoader, PlaylistStore,
};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

fn extensions() -> Vec<String> {
    vec!["mp3".to_string(), "m4a".to_string()]
}

/// A music folder with untagged files; they load with their file names as titles.
fn library(names: &[&str]) -> TempDir {
    let dir = tempdir().unwrap();
    for name in names {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not audio").unwrap();
    }
    dir
}

fn titles(playlist: &Playlist) -> Vec<String> {
    playlist
        .visible_songs()
        .iter()
        .map(|s| s.metadata.title.clone())
        .collect()
}

#[test]
fn loads_folders_and_caches_metadata() {
    let music = library(&["b.mp3", "a.mp3", "sub/c.m4a", "notes.txt"]);
    let data = tempdir().unwrap();
    let cache_path = data.path().join("songs.cache");

    let mut cache = MetadataCache::open(&cache_path).unwrap();
    let mut playlist = Playlist::with_seed(1);
    let definition = PlaylistDefinition::new("All").with_path(PathEntry::new(music.path()));

    let loaded = PlaylistLoader::new(&mut cache, extensions())
        .load(&mut playlist, definition)
        .unwrap();

    assert_eq!(loaded, 3);
    assert_eq!(playlist.state(), LoadState::Loaded);
    assert_eq!(titles(&playlist), vec!["a", "b", "c"]);

    let reopened = MetadataCache::open(&cache_path).unwrap();
    assert_eq!(reopened.len(), 3);
}

#[test]
fn permanent_filter_and_exclusions_apply_on_load() {
    let music = library(&["keep one.mp3", "drop.mp3", "skip/keep two.mp3", "keep three.mp3"]);
    let data = tempdir().unwrap();
    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::with_seed(1);

    let definition = PlaylistDefinition::new("Keepers").with_path(PathEntry {
        path: music.path().to_path_buf(),
        filter: "keep sort:title:desc".into(),
        sort: String::new(),
        exclude: vec![music.path().join("skip")],
    });

    PlaylistLoader::new(&mut cache, extensions())
        .load(&mut playlist, definition)
        .unwrap();

    assert_eq!(titles(&playlist), vec!["keep three", "keep one"]);
}

#[test]
fn missing_sources_fail_the_load() {
    let data = tempdir().unwrap();
    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::new();

    let definition = PlaylistDefinition::new("Gone").with_path(PathEntry::new(data.path().join("nowhere")));
    let result = PlaylistLoader::new(&mut cache, extensions()).load(&mut playlist, definition);
    assert!(matches!(result, Err(PlaylistError::PathNotFound(_))));

    let definition = PlaylistDefinition::new("Gone").with_song(data.path().join("nothing.mp3"));
    let result = PlaylistLoader::new(&mut cache, extensions()).load(&mut playlist, definition);
    assert!(matches!(result, Err(PlaylistError::FileNotFound(_))));
}

#[test]
fn watch_events_keep_the_playlist_current() {
    let music = library(&["a.mp3", "b.mp3"]);
    let data = tempdir().unwrap();
    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::with_seed(1);
    let events = playlist.subscribe();
    let mut loader = PlaylistLoader::new(&mut cache, extensions());

    loader
        .load(&mut playlist, PlaylistDefinition::new("Live").with_path(PathEntry::new(music.path())))
        .unwrap();
    playlist.shuffle_on();

    let added = music.path().join("c.mp3");
    fs::write(&added, b"new").unwrap();
    loader.apply_watch_event(&mut playlist, &WatchEvent::Added(added.clone())).unwrap();
    // a second notification for the same file is a no-op
    loader.apply_watch_event(&mut playlist, &WatchEvent::Added(added.clone())).unwrap();
    assert_eq!(titles(&playlist), vec!["a", "b", "c"]);
    assert_eq!(playlist.shuffle_order().map(|o| o.len()), Some(3));

    fs::remove_file(music.path().join("a.mp3")).unwrap();
    loader
        .apply_watch_event(&mut playlist, &WatchEvent::Removed(music.path().join("a.mp3")))
        .unwrap();
    assert_eq!(titles(&playlist), vec!["b", "c"]);

    let mut order = playlist.shuffle_order().unwrap().to_vec();
    order.sort();
    assert_eq!(order, vec![0, 1]);

    let received: Vec<PlaylistEvent> = events.try_iter().collect();
    assert_eq!(
        received.iter().filter(|e| matches!(e, PlaylistEvent::Add { .. })).count(),
        1
    );
    assert_eq!(
        received.iter().filter(|e| matches!(e, PlaylistEvent::Remove { .. })).count(),
        1
    );
}

#[test]
fn files_moved_into_a_source_are_picked_up() {
    let music = library(&["a.mp3"]);
    let elsewhere = library(&["new.mp3", "other.mp3"]);
    let data = tempdir().unwrap();
    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::with_seed(1);
    let mut loader = PlaylistLoader::new(&mut cache, extensions());

    loader
        .load(&mut playlist, PlaylistDefinition::new("In").with_path(PathEntry::new(music.path())))
        .unwrap();

    let moved = music.path().join("new.mp3");
    fs::rename(elsewhere.path().join("new.mp3"), &moved).unwrap();
    let raw = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To))).add_path(moved.clone());
    let changes = translate(&raw, &extensions());
    assert_eq!(changes, vec![WatchEvent::Added(moved.clone())]);
    for change in &changes {
        loader.apply_watch_event(&mut playlist, change).unwrap();
    }
    assert_eq!(titles(&playlist), vec!["a", "new"]);

    // backends that report a rename per path only say something changed
    let other = music.path().join("other.mp3");
    fs::rename(elsewhere.path().join("other.mp3"), &other).unwrap();
    loader.apply_watch_event(&mut playlist, &WatchEvent::Changed(other)).unwrap();
    assert_eq!(titles(&playlist), vec!["a", "new", "other"]);

    // unknown files outside the sources stay out
    let stray = elsewhere.path().join("stray.mp3");
    fs::write(&stray, b"x").unwrap();
    loader.apply_watch_event(&mut playlist, &WatchEvent::Changed(stray)).unwrap();
    assert_eq!(playlist.len(), 3);
}

#[cfg(unix)]
#[test]
fn renames_are_followed_by_file_id() {
    let music = library(&["01.mp3"]);
    let data = tempdir().unwrap();
    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::with_seed(1);
    let mut loader = PlaylistLoader::new(&mut cache, extensions());

    loader
        .load(&mut playlist, PlaylistDefinition::new("R").with_path(PathEntry::new(music.path())))
        .unwrap();
    let fid = playlist.songs()[0].fid.clone();

    let song = playlist.songs()[0].clone();
    let new_name = RenameRule::new("%filename% (live)").apply(&song);
    let renamed = FileManager::new(music.path())
        .rename_in_place(&song.path, &new_name)
        .unwrap();
    loader
        .apply_watch_event(&mut playlist, &WatchEvent::Changed(renamed.clone()))
        .unwrap();

    assert_eq!(playlist.len(), 1);
    let current = playlist.get(&fid).unwrap();
    assert_eq!(current.path, renamed);
    assert_eq!(current.file_name(), "01 (live).mp3");
}

#[test]
fn plays_survive_a_reload() {
    let music = library(&["a.mp3", "b.mp3"]);
    let data = tempdir().unwrap();
    let cache_path = data.path().join("songs.cache");
    let definition = PlaylistDefinition::new("P").with_path(PathEntry::new(music.path()));

    {
        let mut cache = MetadataCache::open(&cache_path).unwrap();
        let mut playlist = Playlist::new();
        let mut loader = PlaylistLoader::new(&mut cache, extensions());
        loader.load(&mut playlist, definition.clone()).unwrap();

        let fid = playlist.songs()[1].fid.clone();
        assert_eq!(loader.record_play(&mut playlist, &fid).unwrap(), Some(1));
        assert_eq!(loader.record_play(&mut playlist, &fid).unwrap(), Some(2));
    }

    let mut cache = MetadataCache::open(&cache_path).unwrap();
    let mut playlist = Playlist::new();
    PlaylistLoader::new(&mut cache, extensions())
        .load(&mut playlist, definition)
        .unwrap();
    playlist.apply_filter("sort:plays:desc");
    assert_eq!(titles(&playlist), vec!["b", "a"]);
}

#[test]
fn removed_songs_are_excluded_from_the_saved_definition() {
    let music = library(&["a.mp3", "b.mp3"]);
    let data = tempdir().unwrap();
    let mut store = PlaylistStore::open(data.path().join("playlists")).unwrap();
    let stored = store
        .add(PlaylistDefinition::new("Mix").with_path(PathEntry::new(music.path())))
        .unwrap();

    let mut cache = MetadataCache::open(data.path().join("songs.cache")).unwrap();
    let mut playlist = Playlist::new();
    let events = playlist.subscribe();
    let mut loader = PlaylistLoader::new(&mut cache, extensions());
    loader.load(&mut playlist, stored).unwrap();

    let fid = playlist.songs()[0].fid.clone();
    assert_eq!(playlist.remove_songs(&[fid]), 1);

    for event in events.try_iter() {
        if let PlaylistEvent::DefinitionUpdate(definition) = event {
            store.save(&definition, None).unwrap();
        }
    }

    let mut reloaded = Playlist::new();
    loader.load(&mut reloaded, store.get("mix").unwrap()).unwrap();
    assert_eq!(titles(&reloaded), vec!["b"]);
    assert!(Path::new(&music.path().join("a.mp3")).exists());
}
