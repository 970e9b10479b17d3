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

//! Source library discovery.
//!
//! The source library is laid out as `band/album/track.mp3`. Only the two
//! directory levels below the root are inspected; anything nested deeper than
//! an album directory, and any file that is not an MP3, is ignored.
//!
//! Every listing is sorted by file name so that a run over an unchanged
//! library always visits bands, albums and tracks in the same order.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// The file extension of tracks eligible for transfer, matched
/// case-insensitively.
pub(crate) const TRACK_EXTENSION: &str = ".mp3";

/// A directory directly below a library level, i.e. a band or an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LibraryDir {
    pub(crate) name: OsString,
    pub(crate) path: PathBuf,
}

/// A source track file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Track {
    pub(crate) file_name: OsString,
    pub(crate) path: PathBuf,
}

/// The eligible tracks discovered in a single album directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Batch {
    pub(crate) band: String,
    pub(crate) album: OsString,
    pub(crate) tracks: Vec<Track>,
}

impl Batch {
    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The destination file name for `track`, `<album>-<file name>`.
    pub(crate) fn destination_name(&self, track: &Track) -> OsString {
        let mut name = self.album.clone();
        name.push("-");
        name.push(&track.file_name);
        name
    }
}

/// Lists the directories directly below `path`, sorted by name.
///
/// Symbolic links to directories are followed. Entries that can not be read,
/// such as dangling links, are skipped with a warning.
///
/// # Errors
///
/// Returns an error if `path` itself cannot be read.
pub(crate) fn list_dirs(path: &Path) -> Result<Vec<LibraryDir>, walkdir::Error> {
    list_entries(path, |entry| entry.file_type().is_dir())
        .map(|entries| {
            entries
                .into_iter()
                .map(|entry| LibraryDir {
                    name: entry.file_name().to_os_string(),
                    path: entry.into_path(),
                })
                .collect()
        })
}

/// Collects the MP3 files directly inside `album_dir`, sorted by name.
///
/// Entries that can not be read, such as dangling links, are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if the album directory itself cannot be read.
pub(crate) fn collect_tracks(album_dir: &Path) -> Result<Vec<Track>, walkdir::Error> {
    list_entries(album_dir, |entry| {
        entry.file_type().is_file() && is_track(&entry.file_name().to_string_lossy())
    })
    .map(|entries| {
        entries
            .into_iter()
            .map(|entry| Track {
                file_name: entry.file_name().to_os_string(),
                path: entry.into_path(),
            })
            .collect()
    })
}

/// Whether `file_name` names an eligible track.
pub(crate) fn is_track(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(TRACK_EXTENSION)
}

fn list_entries(
    path: &Path,
    keep: impl Fn(&DirEntry) -> bool,
) -> Result<Vec<DirEntry>, walkdir::Error> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Depth 0 errors come from `path` itself.
            Err(e) if e.depth() > 0 => {
                warn!(
                    "Skipping unreadable entry {}: {}",
                    e.path().unwrap_or(path).display(),
                    e
                );
                continue;
            }
            Err(e) => return Err(e),
        };
        if keep(&entry) {
            entries.push(entry);
        }
    }

    Ok(entries)
}
