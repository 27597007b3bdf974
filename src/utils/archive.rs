use std::fs::File;
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};
use crate::{Result, Song};

/// Archive entry name for the song at `index` (zero based) of `total`:
/// `NN - basename`, zero padded to at least two digits.
pub fn entry_name(index: usize, total: usize, song: &Song) -> String {
    let width = total.to_string().len().max(2);
    format!("{:0width$} - {}", index + 1, song.file_name(), width = width)
}

/// Write `songs` into a zip archive at `output`, numbered in order.
/// Files that vanished are skipped with a warning. Returns how many were stored.
pub fn export_zip(songs: &[&Song], output: impl AsRef<Path>) -> Result<usize> {
    let output = output.as_ref();
    let mut zip = ZipWriter::new(File::create(output)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut stored = 0;
    for (i, song) in songs.iter().enumerate() {
        let mut source = match File::open(&song.path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("skipping {}: {}", song.path.display(), e);
                continue;
            }
        };

        zip.start_file(entry_name(i, songs.len(), song), options)?;
        io::copy(&mut source, &mut zip)?;
        stored += 1;
    }

    zip.finish()?;
    log::info!("exported {} songs to {}", stored, output.display());
    Ok(stored)
}
