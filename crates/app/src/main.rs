mod listing;
mod loader;

use std::{
    path::{Path, PathBuf},
    sync::mpsc,
};

use clap::{Parser, Subcommand};
use sound_organizer_core::{
    AlbumTree, AppConfig, FileClipPlayer, LibrarySnapshot, Organizer, PlaybackEvent, SoundClip,
};
use tracing_subscriber::EnvFilter;

fn main() -> sound_organizer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Scan { dir, save } => run_scan(config, &dir, save.as_deref()),
        Commands::Show { snapshot } => run_show(&snapshot),
        Commands::Play { files } => run_play(config, files),
    }
}

fn run_scan(
    config: AppConfig,
    dir: &Path,
    save: Option<&Path>,
) -> sound_organizer_core::Result<()> {
    tracing::info!(?dir, "scanning for sound clips");

    let clips = loader::load_sound_clips(dir, &config.library);
    let tree = AlbumTree::new(config.library.root_title.clone());
    let count = clips.len();
    tree.add_clips(tree.root(), clips)?;
    tracing::info!(count, "sound clips loaded");

    let snapshot = tree.snapshot()?;
    print!("{}", listing::render_outline(&snapshot));

    if let Some(path) = save {
        snapshot.write_to(path)?;
        tracing::info!(?path, "library snapshot saved");
    }
    Ok(())
}

fn run_show(path: &Path) -> sound_organizer_core::Result<()> {
    let snapshot = LibrarySnapshot::read_from(path)?;
    // Rebuild so hand-edited snapshots are shown with clips propagated.
    let tree = AlbumTree::from_snapshot(&snapshot)?;
    print!("{}", listing::render_outline(&tree.snapshot()?));
    Ok(())
}

fn run_play(config: AppConfig, files: Vec<PathBuf>) -> sound_organizer_core::Result<()> {
    let (event_tx, event_rx) = mpsc::channel();
    let tree = AlbumTree::new(config.library.root_title.clone());
    let organizer = Organizer::start_with(config, tree, FileClipPlayer, Some(event_tx))?;

    let batch = organizer.play(files.iter().map(SoundClip::from_path).collect())?;
    tracing::info!(%batch, clips = files.len(), "playback queued");
    organizer.shutdown()?;

    for event in event_rx {
        match event {
            PlaybackEvent::ClipFinished { clip, .. } => println!("played  {clip}"),
            PlaybackEvent::ClipFailed { clip, reason, .. } => {
                println!("failed  {clip}: {reason}")
            }
            PlaybackEvent::BatchFinished { failures, .. } if failures > 0 => {
                tracing::warn!(failures, "some clips could not be played");
            }
            _ => {}
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Organise sound clips into albums", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every sound clip below a directory into the root album.
    Scan {
        /// Directory to search recursively.
        dir: PathBuf,
        /// Write the resulting library snapshot to this file.
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
    /// Print the album hierarchy stored in a snapshot file.
    Show {
        snapshot: PathBuf,
    },
    /// Play the given files, in order, as one batch.
    Play {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
