use std::collections::HashSet;
use std::path::{Path, PathBuf};
use clap::Parser;
use crossbeam::channel::Receiver;
use playlist_manager::{
    Config,
    FileId,
    MetadataCache,
    MetadataExtractor,
    PathEntry,
    Playlist,
    PlaylistDefinition,
    PlaylistEntry,
    PlaylistEvent,
    PlaylistLoader,
    PlaylistStore,
    Result,
    Song,
    SortDirective,
    SortOrder,
    audio::watch::LibraryWatcher,
    utils::{
        archive,
        file_ops::FileManager,
        rename::RenameRule,
        reporting::{format_length, Reporter},
    },
};
use playlist_manager::cli::commands::{Cli, Commands, ViewArgs};

fn main() {
    env_logger::init();

    // Configure thread pool
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
    {
        log::warn!("unable to configure thread pool: {}", e);
    }
    log::debug!("initialized with {} threads", rayon::current_num_threads());

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.data_dir, cli.extensions)?;
    log::debug!("data directory: {}", config.data_dir.display());

    match cli.command {
        Commands::Playlists => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let definitions = store.load_all()?;

            if definitions.is_empty() {
                println!("No playlists yet.");
                return Ok(());
            }

            for definition in &definitions {
                let created = chrono::DateTime::from_timestamp_millis(definition.created)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{:<30} {}  ({} sources)", definition.name, created, definition.items.len());
            }
        }

        Commands::Create { name, paths, songs, filter, sort } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let name = match name {
                Some(name) => name,
                None => store.next_default_name()?,
            };

            let mut definition = PlaylistDefinition::new(name);
            for path in paths {
                definition = definition.with_path(PathEntry {
                    path: absolute(&path),
                    filter: filter.clone(),
                    sort: sort.clone(),
                    exclude: Vec::new(),
                });
            }
            for song in songs {
                definition = definition.with_song(absolute(&song));
            }

            let stored = store.add(definition)?;
            println!("Created playlist '{}' with {} sources", stored.name, stored.items.len());
        }

        Commands::Delete { name } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            store.remove(&name)?;
            println!("Deleted playlist '{}'", name);
        }

        Commands::Show { name, view, shuffle, seed, next, previous } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let mut cache = MetadataCache::open(config.cache_file())?;
            let mut playlist = seed.map_or_else(Playlist::new, Playlist::with_seed);
            let mut loader = PlaylistLoader::new(&mut cache, config.extensions.clone());

            loader.load(&mut playlist, store.get(&name)?)?;
            apply_view(&mut playlist, &view);
            if shuffle {
                playlist.shuffle_on();
            }

            if let Some(fid) = next {
                print_neighbour("Next", playlist.item_after(Some(&FileId::new(fid))));
            } else if let Some(fid) = previous {
                print_neighbour("Previous", playlist.item_before(Some(&FileId::new(fid))));
            } else {
                let songs = listing(&playlist);
                print_songs(&songs);
                println!("\n{} of {} songs", songs.len(), playlist.len());
            }
        }

        Commands::Play { name, fid } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let mut cache = MetadataCache::open(config.cache_file())?;
            let mut playlist = Playlist::new();
            let mut loader = PlaylistLoader::new(&mut cache, config.extensions.clone());

            loader.load(&mut playlist, store.get(&name)?)?;
            let fid = FileId::new(fid);
            match loader.record_play(&mut playlist, &fid)? {
                Some(plays) => {
                    println!("Played {} ({} plays)", fid, plays);
                    print_neighbour("Next", playlist.item_after(Some(&fid)));
                }
                None => println!("No song with id {} in '{}'", fid, name),
            }
        }

        Commands::Scan { dirs } => {
            println!("=== Scanning for audio files ===");
            for dir in &dirs {
                println!("  - {}", dir.display());
            }

            let songs = MetadataExtractor::process_directories(&dirs, &config.extensions)?;
            let refs: Vec<&Song> = songs.iter().collect();
            print_songs(&refs);
            println!("\nFound {} audio files", songs.len());
        }

        Commands::Rename { name, rule, view, dry_run } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let mut cache = MetadataCache::open(config.cache_file())?;
            let mut playlist = Playlist::new();
            let events = playlist.subscribe();
            let mut loader = PlaylistLoader::new(&mut cache, config.extensions.clone());

            loader.load(&mut playlist, store.get(&name)?)?;
            apply_view(&mut playlist, &view);

            let rule = RenameRule::new(rule);
            let planned: Vec<(FileId, PathBuf, String)> = playlist
                .visible_songs()
                .into_iter()
                .map(|song| (song.fid.clone(), song.path.clone(), rule.apply(song)))
                .filter(|(_, path, new_name)| path.file_name().is_some_and(|n| n.to_string_lossy() != new_name.as_str()))
                .collect();

            if planned.is_empty() {
                println!("Nothing to rename.");
                return Ok(());
            }

            for (fid, path, new_name) in planned {
                if dry_run {
                    println!("Would rename: {} -> {}", path.display(), new_name);
                    continue;
                }

                let manager = FileManager::new(path.parent().unwrap_or(Path::new(".")));
                match manager.rename_in_place(&path, &new_name) {
                    Ok(new_path) => {
                        println!("Renamed: {} -> {}", path.display(), new_path.display());
                        playlist.rename_song(&fid, &new_path);
                    }
                    Err(e) => eprintln!("Error renaming {}: {}", path.display(), e),
                }
            }

            save_definition_updates(&events, &mut store)?;
        }

        Commands::Export { name, view, csv, zip } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let mut cache = MetadataCache::open(config.cache_file())?;
            let mut playlist = Playlist::new();
            let mut loader = PlaylistLoader::new(&mut cache, config.extensions.clone());

            loader.load(&mut playlist, store.get(&name)?)?;
            apply_view(&mut playlist, &view);
            let songs = playlist.visible_songs();

            if let Some(path) = csv {
                Reporter::new().generate_playlist_report(&songs, &path)?;
                println!("Listing saved to: {}", path.display());
            }
            if let Some(path) = zip {
                let stored = archive::export_zip(&songs, &path)?;
                println!("Archived {} of {} songs to: {}", stored, songs.len(), path.display());
            }
        }

        Commands::Watch { name } => {
            let mut store = PlaylistStore::open(config.playlists_dir())?;
            let mut cache = MetadataCache::open(config.cache_file())?;
            let mut playlist = Playlist::new();
            let events = playlist.subscribe();
            let mut loader = PlaylistLoader::new(&mut cache, config.extensions.clone());

            let definition = store.get(&name)?;
            let sources = watch_roots(&definition);
            loader.load(&mut playlist, definition)?;
            println!("Loaded '{}' with {} songs", playlist.name(), playlist.len());

            let watcher = LibraryWatcher::start(&sources, config.extensions.clone())?;
            println!("Watching {} folders, press Ctrl-C to stop", sources.len());

            for change in watcher.events().iter() {
                if let Err(e) = loader.apply_watch_event(&mut playlist, &change) {
                    eprintln!("Error applying change to {}: {}", change.path().display(), e);
                }

                for event in events.try_iter() {
                    match event {
                        PlaylistEvent::Add { fid } => {
                            let title = playlist.get(&fid).map(describe).unwrap_or_default();
                            println!("+ {}", title);
                        }
                        PlaylistEvent::Remove { fid } => println!("- {}", fid),
                        PlaylistEvent::DefinitionUpdate(definition) => store.save(&definition, None)?,
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Folders to watch: every source folder, plus the folders of single-file entries.
fn watch_roots(definition: &PlaylistDefinition) -> Vec<PathBuf> {
    let mut roots = definition.source_paths();
    for item in &definition.items {
        if let PlaylistEntry::Song(song) = item {
            if let Some(parent) = song.filename.parent() {
                roots.push(parent.to_path_buf());
            }
        }
    }

    let mut seen = HashSet::new();
    roots.retain(|root| seen.insert(root.clone()));
    roots
}

fn apply_view(playlist: &mut Playlist, view: &ViewArgs) {
    if let Some(filter) = &view.filter {
        playlist.apply_filter(filter);
    }
    if let Some(directive) = view.sort.as_deref().and_then(SortDirective::parse) {
        playlist.set_sort(SortOrder::By(directive));
    }
    if let Some(preview) = &view.preview {
        playlist.preview_filter(preview);
    }
}

/// Visible songs in play order: shuffled if shuffle is on.
fn listing(playlist: &Playlist) -> Vec<&Song> {
    let Some(order) = playlist.shuffle_order() else {
        return playlist.visible_songs();
    };

    let visible: HashSet<&FileId> = playlist.visible_ids().iter().collect();
    order
        .iter()
        .filter_map(|&i| playlist.filtered_ids().get(i))
        .filter(|fid| visible.contains(fid))
        .filter_map(|fid| playlist.get(fid))
        .collect()
}

fn describe(song: &Song) -> String {
    let m = &song.metadata;
    if m.artist.is_empty() {
        m.title.clone()
    } else {
        format!("{} - {}", m.artist, m.title)
    }
}

fn print_songs(songs: &[&Song]) {
    for (i, song) in songs.iter().enumerate() {
        println!(
            "{:>4}  {:<12} {:<50} {:>8}",
            i + 1,
            song.fid,
            describe(song),
            format_length(song.metadata.length)
        );
    }
}

fn print_neighbour(label: &str, song: Option<&Song>) {
    match song {
        Some(song) => println!("{}: {} [{}]", label, describe(song), song.fid),
        None => println!("{}: nothing to play", label),
    }
}

fn save_definition_updates(events: &Receiver<PlaylistEvent>, store: &mut PlaylistStore) -> Result<()> {
    for event in events.try_iter() {
        if let PlaylistEvent::DefinitionUpdate(definition) = event {
            store.save(&definition, None)?;
            println!("Updated playlist '{}'", definition.name);
        }
    }
    Ok(())
}
