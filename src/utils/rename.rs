use std::path::Path;
use std::sync::OnceLock;
use regex::Regex;
use crate::Song;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"%([^%]*)%").expect("token pattern is valid"))
}

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r#"[/\\?%*:|"<>]"#).expect("character class is valid"))
}

/// Replace characters that are not allowed in file names with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    unsafe_chars().replace_all(name, "-").into_owned()
}

/// A file naming rule such as `%artist% - %title%`.
///
/// Known tokens are `%filename%` (the current name without extension), `%title%`,
/// `%artist%` and `%album%`, matched case-insensitively. Unknown tokens expand to
/// nothing. Text outside tokens is copied as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRule {
    pattern: String,
}

impl RenameRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into() }
    }

    /// New file name for `song`, keeping its extension. Characters that are not
    /// allowed in file names become `-`.
    pub fn apply(&self, song: &Song) -> String {
        let stem = song
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let expanded = token_regex().replace_all(&self.pattern, |caps: &regex::Captures| {
            match caps[1].to_lowercase().as_str() {
                "filename" => stem.clone(),
                "title" => song.metadata.title.clone(),
                "artist" => song.metadata.artist.clone(),
                "album" => song.metadata.album.clone(),
                _ => String::new(),
            }
        });

        let name = sanitize_file_name(expanded.trim());
        match Path::new(&song.path).extension() {
            Some(ext) => format!("{}.{}", name, ext.to_string_lossy()),
            None => name,
        }
    }
}
