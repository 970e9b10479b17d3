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

//! Library transfer.
//!
//! Walks the source library band by band and album by album, asks the
//! [`FolderAllocator`] where each album belongs, and copies the album's tracks
//! into that folder under the destination root. Each copied track is renamed
//! to `<album>-<track file name>` so that tracks from different albums can
//! share a folder.
//!
//! # Write modes
//!
//! * [`WriteMode::Merge`] (the default) creates missing folders and copies
//!   into them, overwriting files of the same name and leaving anything else
//!   in place. Running twice over an unchanged library yields the same
//!   destination content.
//! * [`WriteMode::Reset`] deletes each destination folder, including its
//!   contents, the first time the run allocates it and then recreates it.
//!
//! # Failure policy
//!
//! The first failure ends the run. Files copied before the failure are left in
//! place.

use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    allocator::{AllocationError, FolderAllocator},
    library::{self, Batch, LibraryDir},
};

#[derive(Error, Debug)]
pub(crate) enum TransferError {
    #[error("music directory '{}' does not exist or is not a directory", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to prepare destination folder '{}': {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy '{}' to '{}' (band '{band}', album '{}'): {source}",
        from.display(), to.display(), album.to_string_lossy())]
    CopyFailure {
        band: String,
        album: OsString,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    FolderCapacityExceeded(#[from] AllocationError),

    #[error("failed to write transfer report: {0}")]
    Report(#[source] io::Error),
}

/// How existing destination folders are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum WriteMode {
    #[default]
    Merge,
    Reset,
}

/// Everything a transfer run needs to know.
#[derive(Clone, Debug)]
pub(crate) struct TransferOptions {
    pub(crate) music_dir: PathBuf,
    pub(crate) dest_dir: PathBuf,
    /// Band directory names to transfer, all bands when empty.
    pub(crate) bands: Vec<String>,
    pub(crate) mode: WriteMode,
    /// Plan and report the transfer without writing anything.
    pub(crate) dry_run: bool,
    pub(crate) max_files_per_folder: usize,
    pub(crate) max_folders: Option<usize>,
}

/// Totals for a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) bands: usize,
    pub(crate) albums: usize,
    pub(crate) empty_albums: usize,
    pub(crate) files: usize,
    pub(crate) folders: usize,
}

/// Transfers the music library described by `options`.
///
/// A line of the form `<source> --> <destination>` is written to `report` for
/// every track once it has been copied, or in a dry run once it has been
/// planned.
///
/// # Errors
///
/// Returns [`TransferError::SourceNotFound`] before doing anything if the music
/// directory is missing. Otherwise the first listing, folder creation,
/// allocation or copy failure ends the run and is returned.
pub(crate) fn run(
    options: &TransferOptions,
    report: &mut dyn Write,
) -> Result<RunSummary, TransferError> {
    if !options.music_dir.is_dir() {
        return Err(TransferError::SourceNotFound {
            path: options.music_dir.clone(),
        });
    }

    let mut transfer = Transfer::new(options, report);
    transfer.run()?;

    Ok(transfer.summary)
}

/// State for a single run.
struct Transfer<'a> {
    options: &'a TransferOptions,
    report: &'a mut dyn Write,
    allocator: FolderAllocator,
    /// Destination folders already created (or reset) during this run.
    prepared: HashSet<PathBuf>,
    summary: RunSummary,
}

impl<'a> Transfer<'a> {
    fn new(options: &'a TransferOptions, report: &'a mut dyn Write) -> Self {
        Self {
            options,
            report,
            allocator: FolderAllocator::new(options.max_files_per_folder, options.max_folders),
            prepared: HashSet::new(),
            summary: RunSummary::default(),
        }
    }

    fn run(&mut self) -> Result<(), TransferError> {
        let options = self.options;

        if options.dry_run {
            info!("Dry run, nothing will be written");
        } else {
            fs::create_dir_all(&options.dest_dir).map_err(|source| {
                TransferError::DestinationUnwritable {
                    path: options.dest_dir.clone(),
                    source,
                }
            })?;
        }

        let band_dirs = scan(&options.music_dir, library::list_dirs(&options.music_dir))?;

        let mut matched = HashSet::new();

        for band_dir in band_dirs {
            let Some(band) = band_dir.name.to_str() else {
                warn!("Skipping band directory with non UTF-8 name: {}", band_dir.path.display());
                continue;
            };

            if !options.bands.is_empty() {
                if !options.bands.iter().any(|b| b == band) {
                    continue;
                }
                matched.insert(band.to_string());
            }

            self.transfer_band(band, &band_dir)?;
        }

        for band in options.bands.iter().filter(|b| !matched.contains(*b)) {
            warn!("No band directory named '{}' in {}", band, options.music_dir.display());
        }

        self.summary.folders = self.allocator.folder_count();

        Ok(())
    }

    fn transfer_band(&mut self, band: &str, band_dir: &LibraryDir) -> Result<(), TransferError> {
        debug!("Scanning band {}", band_dir.path.display());
        self.summary.bands += 1;

        for album_dir in scan(&band_dir.path, library::list_dirs(&band_dir.path))? {
            let batch = Batch {
                band: band.to_string(),
                album: album_dir.name,
                tracks: scan(&album_dir.path, library::collect_tracks(&album_dir.path))?,
            };

            if batch.is_empty() {
                debug!("No tracks in {}", album_dir.path.display());
                self.summary.empty_albums += 1;
                continue;
            }

            self.transfer_batch(&batch)?;
        }

        Ok(())
    }

    fn transfer_batch(&mut self, batch: &Batch) -> Result<(), TransferError> {
        let folder = self.allocator.assign_folder(&batch.band, batch.len())?;
        let folder_path = self.options.dest_dir.join(&folder);

        if let Some(state) = self.allocator.band(&batch.band) {
            debug!(
                "Album '{}' by '{}' ({} tracks) -> {} (folder {}, {} files)",
                batch.album.to_string_lossy(),
                batch.band,
                batch.len(),
                state.folder_name(),
                state.folder_sequence(),
                state.file_count()
            );
        }

        self.prepare_folder(&folder_path)?;

        for track in &batch.tracks {
            let dest = folder_path.join(batch.destination_name(track));

            if !self.options.dry_run {
                fs::copy(&track.path, &dest).map_err(|source| TransferError::CopyFailure {
                    band: batch.band.clone(),
                    album: batch.album.clone(),
                    from: track.path.clone(),
                    to: dest.clone(),
                    source,
                })?;
            }

            writeln!(self.report, "{} --> {}", track.path.display(), dest.display())
                .map_err(TransferError::Report)?;

            self.summary.files += 1;
        }

        self.summary.albums += 1;

        Ok(())
    }

    // Makes sure a destination folder exists, clearing it first in reset mode.
    // Each folder is only prepared once per run.
    fn prepare_folder(&mut self, path: &Path) -> Result<(), TransferError> {
        if self.options.dry_run || self.prepared.contains(path) {
            return Ok(());
        }

        let unwritable = |source| TransferError::DestinationUnwritable {
            path: path.to_path_buf(),
            source,
        };

        if self.options.mode == WriteMode::Reset && path.exists() {
            info!("Clearing {}", path.display());
            fs::remove_dir_all(path).map_err(unwritable)?;
        }

        fs::create_dir_all(path).map_err(unwritable)?;
        self.prepared.insert(path.to_path_buf());

        Ok(())
    }
}

fn scan<T>(path: &Path, result: Result<T, walkdir::Error>) -> Result<T, TransferError> {
    result.map_err(|source| TransferError::Scan {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::allocator::{MAX_FILES_PER_DIRECTORY, MAX_FOLDERS};

    struct Fixture {
        music: TempDir,
        dest: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                music: TempDir::new().unwrap(),
                dest: TempDir::new().unwrap(),
            }
        }

        fn add_album(&self, band: &str, album: &str, tracks: usize) -> PathBuf {
            let dir = self.music.path().join(band).join(album);
            fs::create_dir_all(&dir).unwrap();
            for i in 1..=tracks {
                let name = format!("{i:03} Track.mp3");
                fs::write(dir.join(&name), format!("{band}/{album}/{name}")).unwrap();
            }
            dir
        }

        fn options(&self) -> TransferOptions {
            TransferOptions {
                music_dir: self.music.path().to_path_buf(),
                dest_dir: self.dest.path().to_path_buf(),
                bands: vec![],
                mode: WriteMode::Merge,
                dry_run: false,
                max_files_per_folder: MAX_FILES_PER_DIRECTORY,
                max_folders: Some(MAX_FOLDERS),
            }
        }

        // Destination folder name -> sorted file names.
        fn layout(&self) -> BTreeMap<String, Vec<String>> {
            let mut layout = BTreeMap::new();
            for folder in fs::read_dir(self.dest.path()).unwrap() {
                let folder = folder.unwrap();
                let mut files: Vec<String> = fs::read_dir(folder.path())
                    .unwrap()
                    .map(|f| f.unwrap().file_name().to_string_lossy().into_owned())
                    .collect();
                files.sort();
                layout.insert(folder.file_name().to_string_lossy().into_owned(), files);
            }
            layout
        }
    }

    #[test]
    fn copies_album_with_prefixed_names() {
        let fx = Fixture::new();
        let album = fx.add_album("Nirvana", "Nevermind", 4);
        fs::write(album.join("Polly.mp3"), b"polly bytes").unwrap();

        let mut report = Vec::new();
        let summary = run(&fx.options(), &mut report).unwrap();

        let copied = fx.dest.path().join("Nirvana").join("Nevermind-Polly.mp3");
        let report = String::from_utf8(report).unwrap();
        assert_eq!(report.lines().count(), 5);
        assert!(report.lines().any(|line| line
            == format!("{} --> {}", album.join("Polly.mp3").display(), copied.display())));
        assert_eq!(fs::read(copied).unwrap(), b"polly bytes");
        assert_eq!(fx.layout()["Nirvana"].len(), 5);
        assert_eq!(
            summary,
            RunSummary {
                bands: 1,
                albums: 1,
                empty_albums: 0,
                files: 5,
                folders: 1,
            }
        );
    }

    #[test]
    fn band_under_cap_lands_in_one_folder() {
        let fx = Fixture::new();
        fx.add_album("Blur", "Parklife", 40);
        fx.add_album("Blur", "Blur", 35);
        fx.add_album("Blur", "13", 25);

        run(&fx.options(), &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout["Blur"].len(), 100);
    }

    #[test]
    fn overflow_moves_album_to_numbered_folder() {
        let fx = Fixture::new();
        for album in ["Album 1", "Album 2", "Album 3"] {
            fx.add_album("Prolific", album, 40);
        }

        let summary = run(&fx.options(), &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout["Prolific"].len(), 80);
        assert_eq!(layout["Prolific_2"].len(), 40);
        assert!(layout["Prolific_2"].iter().all(|f| f.starts_with("Album 3-")));
        assert_eq!(summary.folders, 2);
    }

    #[test]
    fn oversized_album_is_not_split() {
        let fx = Fixture::new();
        fx.add_album("Huge", "Box Set", 120);

        run(&fx.options(), &mut io::sink()).unwrap();

        assert_eq!(fx.layout()["Huge"].len(), 120);
    }

    #[test]
    fn ignores_other_formats_and_empty_albums() {
        let fx = Fixture::new();
        fx.add_album("Pixies", "Doolittle", 3);
        let artwork = fx.add_album("Pixies", "Artwork", 0);
        fs::write(artwork.join("cover.jpg"), b"jpg").unwrap();
        fs::write(artwork.join("track.flac"), b"flac").unwrap();
        fx.add_album("Silent", "Nothing", 0);

        let summary = run(&fx.options(), &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout.keys().collect::<Vec<_>>(), ["Pixies"]);
        assert_eq!(layout["Pixies"].len(), 3);
        assert_eq!(summary.bands, 2);
        assert_eq!(summary.empty_albums, 2);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_links_are_skipped() {
        use std::os::unix::fs::symlink;

        let fx = Fixture::new();
        let album = fx.add_album("Nirvana", "Nevermind", 0);
        fs::write(album.join("Polly.mp3"), b"polly bytes").unwrap();
        symlink(album.join("gone.jpg"), album.join("cover.jpg")).unwrap();
        symlink(fx.music.path().join("gone"), fx.music.path().join("Ghost")).unwrap();

        let summary = run(&fx.options(), &mut io::sink()).unwrap();

        assert_eq!(fx.layout()["Nirvana"], ["Nevermind-Polly.mp3"]);
        assert_eq!(summary.bands, 1);
    }

    #[test]
    fn overflow_folder_does_not_merge_with_band_of_same_name() {
        let fx = Fixture::new();
        fx.add_album("X", "Album 1", 60);
        fx.add_album("X", "Album 2", 60);
        fx.add_album("X_2", "Album 1", 60);

        run(&fx.options(), &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout["X"].len(), 60);
        assert_eq!(layout["X_2"].len(), 60);
        assert!(layout["X_2"].iter().all(|f| f.starts_with("Album 2-")));
        assert_eq!(layout["X_2_2"].len(), 60);
    }

    #[test]
    fn dry_run_reports_planned_copies() {
        let fx = Fixture::new();
        fx.add_album("Blur", "Parklife", 3);

        let options = TransferOptions {
            dry_run: true,
            ..fx.options()
        };
        let mut report = Vec::new();
        run(&options, &mut report).unwrap();

        let report = String::from_utf8(report).unwrap();
        let expected = fx.dest.path().join("Blur").join("Parklife-001 Track.mp3");
        assert_eq!(report.lines().count(), 3);
        assert!(report.lines().next().unwrap().ends_with(&format!("--> {}", expected.display())));
    }

    #[test]
    fn band_filter_restricts_transfer() {
        let fx = Fixture::new();
        fx.add_album("Nirvana", "Bleach", 2);
        fx.add_album("Reel Big Fish", "Turn the Radio Off", 3);
        fx.add_album("Blur", "Parklife", 4);

        let options = TransferOptions {
            bands: vec!["Nirvana".to_string(), "Reel Big Fish".to_string(), "nirvana".to_string()],
            ..fx.options()
        };
        let summary = run(&options, &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout.keys().collect::<Vec<_>>(), ["Nirvana", "Reel Big Fish"]);
        assert_eq!(summary.bands, 2);
        assert_eq!(summary.files, 5);
    }

    #[test]
    fn missing_source_is_fatal() {
        let fx = Fixture::new();
        let options = TransferOptions {
            music_dir: fx.music.path().join("missing"),
            ..fx.options()
        };

        let err = run(&options, &mut io::sink()).unwrap_err();

        assert!(matches!(err, TransferError::SourceNotFound { .. }));
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let fx = Fixture::new();
        fx.add_album("Nirvana", "Bleach", 2);
        let blocker = fx.dest.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let options = TransferOptions {
            dest_dir: blocker.join("dest"),
            ..fx.options()
        };
        let err = run(&options, &mut io::sink()).unwrap_err();

        assert!(matches!(err, TransferError::DestinationUnwritable { .. }));
    }

    #[test]
    fn copy_failure_reports_context() {
        let fx = Fixture::new();
        fx.add_album("Nirvana", "Bleach", 2);
        // A directory where the copy target should go makes the copy fail.
        fs::create_dir_all(fx.dest.path().join("Nirvana").join("Bleach-002 Track.mp3")).unwrap();

        let mut report = Vec::new();
        let err = run(&fx.options(), &mut report).unwrap_err();

        match err {
            TransferError::CopyFailure { band, album, from, .. } => {
                assert_eq!(band, "Nirvana");
                assert_eq!(album, "Bleach");
                assert!(from.ends_with("Nirvana/Bleach/002 Track.mp3"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Only the track that was actually copied is reported.
        let report = String::from_utf8(report).unwrap();
        assert_eq!(report.lines().count(), 1);
        assert!(report.contains("Bleach-001 Track.mp3"));
        assert!(!report.contains("002 Track.mp3"));
    }

    #[test]
    fn folder_ceiling_stops_the_run() {
        let fx = Fixture::new();
        fx.add_album("A Band", "First", 2);
        fx.add_album("B Band", "First", 2);

        let options = TransferOptions {
            max_folders: Some(1),
            ..fx.options()
        };
        let err = run(&options, &mut io::sink()).unwrap_err();

        assert!(matches!(err, TransferError::FolderCapacityExceeded(_)));
        assert_eq!(fx.layout().keys().collect::<Vec<_>>(), ["A Band"]);
    }

    #[test]
    fn merge_mode_is_idempotent_and_keeps_other_files() {
        let fx = Fixture::new();
        fx.add_album("Nirvana", "Bleach", 3);
        let existing = fx.dest.path().join("Nirvana");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("keep.mp3"), b"keep").unwrap();

        run(&fx.options(), &mut io::sink()).unwrap();
        let first = fx.layout();
        run(&fx.options(), &mut io::sink()).unwrap();

        assert_eq!(fx.layout(), first);
        assert_eq!(first["Nirvana"].len(), 4);
        assert_eq!(
            fs::read_to_string(existing.join("Bleach-002 Track.mp3")).unwrap(),
            "Nirvana/Bleach/002 Track.mp3"
        );
    }

    #[test]
    fn reset_mode_clears_folders_first() {
        let fx = Fixture::new();
        fx.add_album("Nirvana", "Bleach", 60);
        fx.add_album("Nirvana", "Nevermind", 60);
        for folder in ["Nirvana", "Nirvana_2"] {
            let path = fx.dest.path().join(folder);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join("stale.mp3"), b"stale").unwrap();
        }
        let untouched = fx.dest.path().join("Other");
        fs::create_dir_all(&untouched).unwrap();
        fs::write(untouched.join("stale.mp3"), b"stale").unwrap();

        let options = TransferOptions {
            mode: WriteMode::Reset,
            ..fx.options()
        };
        run(&options, &mut io::sink()).unwrap();

        let layout = fx.layout();
        assert_eq!(layout["Nirvana"].len(), 60);
        assert_eq!(layout["Nirvana_2"].len(), 60);
        assert!(!layout["Nirvana"].contains(&"stale.mp3".to_string()));
        assert_eq!(layout["Other"], ["stale.mp3"]);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let fx = Fixture::new();
        fx.add_album("Prolific", "Album 1", 70);
        fx.add_album("Prolific", "Album 2", 70);
        let dest = fx.dest.path().join("new");

        let options = TransferOptions {
            dest_dir: dest.clone(),
            dry_run: true,
            ..fx.options()
        };
        let summary = run(&options, &mut io::sink()).unwrap();

        assert!(!dest.exists());
        assert_eq!(summary.files, 140);
        assert_eq!(summary.folders, 2);
    }
}
