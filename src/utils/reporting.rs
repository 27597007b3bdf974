use std::io;
use std::path::Path;
use csv::Writer;
use crate::{Result, Song};

pub struct Reporter;

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// One row per song, in the order given.
    pub fn write_playlist<W: io::Write>(&self, songs: &[&Song], out: W) -> Result<()> {
        let mut writer = Writer::from_writer(out);

        writer.write_record(["#", "Title", "Artist", "Album", "Track", "Length", "Plays", "Path"])?;

        for (i, song) in songs.iter().enumerate() {
            let m = &song.metadata;
            writer.write_record([
                (i + 1).to_string(),
                m.title.clone(),
                m.artist.clone(),
                m.album.clone(),
                m.track.to_string(),
                format_length(m.length),
                m.plays.to_string(),
                song.path.display().to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn generate_playlist_report(&self, songs: &[&Song], output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let file = std::fs::File::create(output_path_ref)?;
        self.write_playlist(songs, file)?;
        log::info!("report generated: {}", output_path_ref.display());
        Ok(())
    }
}

/// `m:ss`, or `h:mm:ss` from an hour up.
pub fn format_length(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
