use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use crate::playlist::definition::PlaylistDefinition;
use crate::utils::file_ops::{FileIdentity, SafeWriter};
use crate::utils::rename::sanitize_file_name;
use crate::{PlaylistError, Result};

const EXTENSION: &str = "playlist";

/// Playlist definitions on disk, one `<name>.playlist` JSON file each.
#[derive(Debug)]
pub struct PlaylistStore {
    dir: PathBuf,
    seen: HashMap<PathBuf, FileIdentity>,
}

impl PlaylistStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seen: HashMap::new(),
        })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", sanitize_file_name(name), EXTENSION))
    }

    /// Every readable definition, oldest first. Unreadable files are skipped.
    pub fn load_all(&mut self) -> Result<Vec<PlaylistDefinition>> {
        let mut definitions = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            match self.read(&path) {
                Ok(definition) => definitions.push(definition),
                Err(e) => log::warn!("skipping playlist {}: {}", path.display(), e),
            }
        }

        definitions.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        Ok(definitions)
    }

    fn read(&mut self, path: &Path) -> Result<PlaylistDefinition> {
        let text = fs::read_to_string(path)?;
        let definition = serde_json::from_str(&text)?;
        if let Ok(identity) = FileIdentity::of(path) {
            self.seen.insert(path.to_path_buf(), identity);
        }
        Ok(definition)
    }

    /// Look a playlist up by name, ignoring case.
    pub fn get(&mut self, name: &str) -> Result<PlaylistDefinition> {
        self.load_all()?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PlaylistError::PlaylistNotFound(name.to_string()))
    }

    /// Store a new playlist. A name already taken (ignoring case), or one whose file
    /// name would land on an existing playlist file, gets `_2`, `_3`, … appended.
    /// Returns the definition as stored.
    pub fn add(&mut self, mut definition: PlaylistDefinition) -> Result<PlaylistDefinition> {
        let mut taken = HashSet::new();
        for existing in self.load_all()? {
            taken.insert(sanitize_file_name(&existing.name).to_lowercase());
        }
        let clashes = |name: &str| {
            taken.contains(&sanitize_file_name(name).to_lowercase()) || self.path_for(name).exists()
        };

        if clashes(&definition.name) {
            let base = definition.name.clone();
            let mut counter = 2;
            while clashes(&format!("{}_{}", base, counter)) {
                counter += 1;
            }
            definition.name = format!("{}_{}", base, counter);
            log::info!("playlist name '{}' is taken, using '{}'", base, definition.name);
        }

        self.save(&definition, None)?;
        Ok(definition)
    }

    /// Write `definition`. When it was renamed, pass its `previous` name so the old
    /// file goes away.
    pub fn save(&mut self, definition: &PlaylistDefinition, previous: Option<&str>) -> Result<()> {
        let path = self.path_for(&definition.name);
        let json = serde_json::to_vec_pretty(definition)?;
        let expected = self.seen.get(&path).copied();

        let identity = SafeWriter::write(&path, &json, expected)?;
        self.seen.insert(path.clone(), identity);

        if let Some(previous) = previous {
            let old = self.path_for(previous);
            if old != path && old.exists() {
                fs::remove_file(&old)?;
                self.seen.remove(&old);
            }
        }

        log::debug!("saved playlist '{}' to {}", definition.name, path.display());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let definition = self.get(name)?;
        let path = self.path_for(&definition.name);
        fs::remove_file(&path)?;
        self.seen.remove(&path);

        let backup = path.with_extension(format!("{}.bak", EXTENSION));
        if backup.exists() {
            fs::remove_file(backup)?;
        }
        log::info!("deleted playlist '{}'", definition.name);
        Ok(())
    }

    /// First free `Playlist N` name.
    pub fn next_default_name(&mut self) -> Result<String> {
        let taken: Vec<String> = self
            .load_all()?
            .into_iter()
            .map(|d| d.name.to_lowercase())
            .collect();

        let name = (1..)
            .map(|n| format!("Playlist {}", n))
            .find(|candidate| !taken.contains(&candidate.to_lowercase()))
            .unwrap_or_else(|| "Playlist".to_string());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::definition::PathEntry;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn def(name: &str, created: i64) -> PlaylistDefinition {
        PlaylistDefinition {
            name: name.into(),
            created,
            items: Vec::new(),
        }
    }

    #[test]
    fn loads_sorted_by_creation() {
        let dir = tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path()).unwrap();
        store.add(def("b", 20)).unwrap();
        store.add(def("a", 30)).unwrap();
        store.add(def("c", 10)).unwrap();
        fs::write(dir.path().join("broken.playlist"), "{ nope").unwrap();

        let names: Vec<String> = store.load_all().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn colliding_names_get_a_suffix() {
        let dir = tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path()).unwrap();
        store.add(def("Mix", 1)).unwrap();
        assert_eq!(store.add(def("mix", 2)).unwrap().name, "mix_2");
        assert_eq!(store.add(def("MIX", 3)).unwrap().name, "MIX_3");
    }

    #[test]
    fn names_with_the_same_file_name_do_not_overwrite() {
        let dir = tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path()).unwrap();
        store.add(def("Rock/Pop", 1)).unwrap();
        assert_eq!(store.add(def("Rock-Pop", 2)).unwrap().name, "Rock-Pop_2");
        assert_eq!(store.add(def("rock:pop", 3)).unwrap().name, "rock:pop_3");

        let names: Vec<String> = store.load_all().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Rock/Pop", "Rock-Pop_2", "rock:pop_3"]);
    }

    #[test]
    fn renaming_removes_the_old_file() {
        let dir = tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path()).unwrap();
        let mut mix = store
            .add(def("Mix", 1).with_path(PathEntry::new("/music")))
            .unwrap();

        mix.name = "House".into();
        store.save(&mix, Some("Mix")).unwrap();

        assert!(!store.path_for("Mix").exists());
        assert_eq!(store.get("house").unwrap(), mix);
        assert!(matches!(store.get("Mix"), Err(PlaylistError::PlaylistNotFound(_))));
    }

    #[test]
    fn remove_and_default_names() {
        let dir = tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path()).unwrap();
        assert_eq!(store.next_default_name().unwrap(), "Playlist 1");
        store.add(def("Playlist 1", 1)).unwrap();
        store.add(def("Playlist 2", 2)).unwrap();
        assert_eq!(store.next_default_name().unwrap(), "Playlist 3");

        store.remove("playlist 1").unwrap();
        assert_eq!(store.next_default_name().unwrap(), "Playlist 1");
        assert!(store.load_all().unwrap().iter().all(|d| d.name != "Playlist 1"));
    }
}
