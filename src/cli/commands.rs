use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "playlist-manager")]
#[command(version = "1.0")]
#[command(about = "Filterable, sortable playlists over local music folders", long_about = None)]
pub struct Cli {
    /// Directory holding playlists and the metadata cache
    #[arg(long, global = true, env = "PLAYLIST_MANAGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Audio file extensions to pick up, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Default)]
pub struct ViewArgs {
    /// Filter expression, may contain sort:criteria[:order] clauses
    #[arg(short = 'f', long)]
    pub filter: Option<String>,

    /// Narrow the filtered songs further
    #[arg(short = 'p', long)]
    pub preview: Option<String>,

    /// Sort directive, e.g. artist,album,track:asc
    #[arg(short = 's', long)]
    pub sort: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List saved playlists
    Playlists,

    /// Create a playlist from folders and files
    Create {
        /// Playlist name; defaults to the next free "Playlist N"
        name: Option<String>,

        /// Folder to include recursively
        #[arg(short = 'i', long = "path")]
        paths: Vec<PathBuf>,

        /// Single file to include
        #[arg(long = "song")]
        songs: Vec<PathBuf>,

        /// Permanent filter for the folders
        #[arg(short = 'f', long, default_value = "")]
        filter: String,

        /// Default order for the folders
        #[arg(short = 's', long, default_value = "")]
        sort: String,
    },

    /// Delete a playlist
    Delete {
        name: String,
    },

    /// Load a playlist and print its songs
    Show {
        name: String,

        #[command(flatten)]
        view: ViewArgs,

        /// Shuffle the listing
        #[arg(long)]
        shuffle: bool,

        /// Seed for --shuffle
        #[arg(long, requires = "shuffle")]
        seed: Option<u64>,

        /// Print the song that follows this file id instead of the listing
        #[arg(long, conflicts_with = "previous")]
        next: Option<String>,

        /// Print the song that precedes this file id instead of the listing
        #[arg(long)]
        previous: Option<String>,
    },

    /// Count a play of a song and print what comes next
    Play {
        name: String,

        /// File id of the song
        fid: String,
    },

    /// Read tags from audio files in folders
    Scan {
        /// Folders to scan
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Rename the files of a playlist by rule
    Rename {
        name: String,

        /// Naming rule, e.g. "%artist% - %title%"
        #[arg(short = 'r', long)]
        rule: String,

        #[command(flatten)]
        view: ViewArgs,

        /// Only print what would be renamed
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Export a playlist as a CSV listing or a zip archive
    Export {
        name: String,

        #[command(flatten)]
        view: ViewArgs,

        /// CSV file to write
        #[arg(long, required_unless_present = "zip")]
        csv: Option<PathBuf>,

        /// Zip archive to write
        #[arg(long)]
        zip: Option<PathBuf>,
    },

    /// Keep a playlist in sync with its folders and report changes
    Watch {
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_show_with_view_options() {
        let cli = Cli::try_parse_from([
            "playlist-manager",
            "--data-dir",
            "/tmp/pm",
            "show",
            "Mix",
            "-f",
            "daft sort:plays:desc",
            "--shuffle",
            "--seed",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/pm")));
        match cli.command {
            Commands::Show { name, view, shuffle, seed, .. } => {
                assert_eq!(name, "Mix");
                assert_eq!(view.filter.as_deref(), Some("daft sort:plays:desc"));
                assert!(shuffle);
                assert_eq!(seed, Some(3));
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn export_needs_a_target() {
        assert!(Cli::try_parse_from(["playlist-manager", "export", "Mix"]).is_err());
        assert!(Cli::try_parse_from(["playlist-manager", "export", "Mix", "--zip", "a.zip"]).is_ok());
    }

    #[test]
    fn extensions_split_on_commas() {
        let cli = Cli::try_parse_from(["playlist-manager", "scan", "/m", "--extensions", "mp3,flac"]).unwrap();
        assert_eq!(cli.extensions, Some(vec!["mp3".to_string(), "flac".to_string()]));
    }
}
