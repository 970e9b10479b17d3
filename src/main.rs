// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! # Alpine MP3 drive builder.
//!
//! Copies a local MP3 collection onto a USB drive in a layout that an Alpine
//! head unit (CDE-135BT and similar) can index. These units ignore anything
//! past 100 folders on a drive or 100 files in a folder.
//!
//! The source library is expected to be organised as
//! `band/album/track.mp3`. The drive gets one folder per band, with every
//! album's tracks renamed to `album-track.mp3` so they can share the folder.
//! When a band's next album would push its folder past 100 files a new folder
//! is opened, e.g. `Nirvana_2`.
//!
//! ## Usage
//!
//! ```text
//! alpinify -B "Nirvana" "Reel Big Fish"
//! ```
//!
//! Default directories and limits are read from the configuration file, and
//! can be overridden on the command line.

mod allocator;
mod config;
mod library;
mod transfer;
mod util;

use std::io;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::AppConfig,
    transfer::{TransferOptions, WriteMode},
    util::path::expand_home,
};

#[derive(Parser, Debug)]
#[command(name = "alpinify")]
#[command(about = "Build an Alpine compatible MP3 drive from a music library", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the music directory, organised as band/album/track.mp3
    #[arg(short = 'M', long)]
    music_dir: Option<String>,

    /// Path to the destination directory, usually the mounted drive
    #[arg(short = 'D', long)]
    dest_dir: Option<String>,

    /// Only transfer these bands (exact directory names)
    #[arg(short = 'B', long, num_args = 0..)]
    bands: Vec<String>,

    /// Delete each destination folder before writing to it
    #[arg(long)]
    reset: bool,

    /// Print what would be copied without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of destination folders
    #[arg(long, conflicts_with = "no_folder_limit")]
    max_folders: Option<usize>,

    /// Do not limit the number of destination folders
    #[arg(long)]
    no_folder_limit: bool,

    /// Store the given music and destination directories as the new defaults
    #[arg(long)]
    save_config: bool,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// The entry point of the application.
///
/// Exits with a non-zero status if the transfer fails.
fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = config::load_config();

    if cli.save_config {
        apply_directories(&cli, &mut config);
        config::save_config(&config).context("Failed to save configuration")?;
        info!("Saved default directories");
    }

    let options = transfer_options(&cli, &config);

    info!(
        "Transferring {} to {}",
        options.music_dir.display(),
        options.dest_dir.display()
    );

    let summary = transfer::run(&options, &mut io::stdout().lock()).context("Transfer failed")?;

    info!(
        "Copied {} files from {} albums by {} bands into {} folders ({} albums without tracks)",
        summary.files, summary.albums, summary.bands, summary.folders, summary.empty_albums
    );

    Ok(())
}

/// Installs the log subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flag. Logs go to stderr,
/// leaving stdout for the copy report.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// Copies directories given on the command line into the configuration.
fn apply_directories(cli: &Cli, config: &mut AppConfig) {
    if let Some(music_dir) = &cli.music_dir {
        config.music_dir = music_dir.clone();
    }
    if let Some(dest_dir) = &cli.dest_dir {
        config.dest_dir = dest_dir.clone();
    }
}

/// Combines the command line with the configuration, command line first.
fn transfer_options(cli: &Cli, config: &AppConfig) -> TransferOptions {
    let music_dir = cli.music_dir.as_deref().unwrap_or(&config.music_dir);
    let dest_dir = cli.dest_dir.as_deref().unwrap_or(&config.dest_dir);

    let max_folders = if cli.no_folder_limit {
        None
    } else {
        cli.max_folders.or(config.max_folders)
    };

    TransferOptions {
        music_dir: expand_home(music_dir),
        dest_dir: expand_home(dest_dir),
        bands: cli.bands.clone(),
        mode: if cli.reset { WriteMode::Reset } else { WriteMode::Merge },
        dry_run: cli.dry_run,
        max_files_per_folder: config.max_files_per_folder,
        max_folders,
    }
}
