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

//! Destination folder allocation.
//!
//! The target head unit refuses to index more than 100 files in a single
//! folder, or more than 100 folders on a drive. This module decides, album by
//! album, which destination folder a band's tracks are written to so that
//! neither limit is crossed.
//!
//! A band starts out in a folder carrying its own name. When the next album
//! would push that folder over the file limit, a fresh folder is opened with
//! the folder sequence appended, e.g. `Nirvana`, `Nirvana_2`, `Nirvana_3`.
//!
//! Folder names are unique across the whole run. If a derived name is already
//! in use, for instance `Nirvana_2` because the library also has a band called
//! `Nirvana_2`, the sequence is advanced until a free name is found.
//!
//! Albums are never split across folders. An album that is larger than the
//! file limit on its own still lands in one folder.
//!
//! The allocator is purely in-memory and never touches the filesystem.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// The maximum number of files the head unit will index in one folder.
pub(crate) const MAX_FILES_PER_DIRECTORY: usize = 100;

/// The maximum number of folders the head unit will index on one drive.
pub(crate) const MAX_FOLDERS: usize = 100;

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum AllocationError {
    #[error("band '{band}' needs folder '{folder}' but all {limit} destination folders are in use")]
    FolderCapacityExceeded {
        band: String,
        folder: String,
        limit: usize,
    },
}

/// Allocation state for a single band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BandAllocation {
    folder_name: String,
    folder_sequence: usize,
    file_count: usize,
}

impl BandAllocation {
    /// The folder currently accepting files for the band.
    pub(crate) fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// The sequence number of the band's current folder. This is the number of
    /// folders opened for the band, plus any numbers skipped because the
    /// derived name was already in use.
    pub(crate) fn folder_sequence(&self) -> usize {
        self.folder_sequence
    }

    /// How many files have been assigned to the current folder.
    pub(crate) fn file_count(&self) -> usize {
        self.file_count
    }
}

/// Assigns album batches to destination folders for the lifetime of one run.
#[derive(Debug)]
pub(crate) struct FolderAllocator {
    max_files_per_folder: usize,
    max_folders: Option<usize>,
    bands: HashMap<String, BandAllocation>,
    /// Every folder name handed out so far, across all bands.
    folders: HashSet<String>,
}

impl Default for FolderAllocator {
    fn default() -> Self {
        Self::new(MAX_FILES_PER_DIRECTORY, Some(MAX_FOLDERS))
    }
}

impl FolderAllocator {
    /// Creates an allocator with empty state.
    ///
    /// # Arguments
    ///
    /// * `max_files_per_folder` - The file cap applied to every folder.
    /// * `max_folders` - An optional ceiling on the number of distinct folders
    ///   handed out across all bands, `None` for no ceiling.
    pub(crate) fn new(max_files_per_folder: usize, max_folders: Option<usize>) -> Self {
        Self {
            max_files_per_folder,
            max_folders,
            bands: HashMap::new(),
            folders: HashSet::new(),
        }
    }

    /// Returns the name of the folder that a batch of `batch_size` tracks
    /// belonging to `band` should be written to.
    ///
    /// The same name is returned for a band until the running file count for
    /// its current folder would exceed the file cap, at which point a new
    /// folder is opened and the count restarts at `batch_size`.
    ///
    /// `batch_size` must be positive. A band's first batch is accepted whatever
    /// its size, so an oversized album is kept whole rather than split.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::FolderCapacityExceeded`] if a new folder is
    /// needed and the folder ceiling has already been reached. The allocator
    /// state is unchanged in that case.
    pub(crate) fn assign_folder(
        &mut self,
        band: &str,
        batch_size: usize,
    ) -> Result<String, AllocationError> {
        debug_assert!(batch_size > 0, "empty batches are never allocated");

        let next = match self.bands.get(band).cloned() {
            None => self.open_folder(band, 1, batch_size)?,
            Some(state) if state.file_count + batch_size > self.max_files_per_folder => {
                self.open_folder(band, state.folder_sequence + 1, batch_size)?
            }
            Some(mut state) => {
                state.file_count += batch_size;
                state
            }
        };

        let name = next.folder_name.clone();
        self.bands.insert(band.to_string(), next);

        Ok(name)
    }

    /// The allocation state for `band`, if any batch has been assigned to it.
    pub(crate) fn band(&self, band: &str) -> Option<&BandAllocation> {
        self.bands.get(band)
    }

    /// The number of distinct folders handed out so far, across all bands.
    pub(crate) fn folder_count(&self) -> usize {
        self.folders.len()
    }

    // Opens the first unused folder for `band` at or after `sequence`, checking
    // the folder ceiling if there is one.
    fn open_folder(
        &mut self,
        band: &str,
        mut sequence: usize,
        file_count: usize,
    ) -> Result<BandAllocation, AllocationError> {
        let mut name = folder_name(band, sequence);
        while self.folders.contains(&name) {
            sequence += 1;
            name = folder_name(band, sequence);
        }

        if let Some(limit) = self.max_folders {
            if self.folders.len() >= limit {
                return Err(AllocationError::FolderCapacityExceeded {
                    band: band.to_string(),
                    folder: name,
                    limit,
                });
            }
        }

        self.folders.insert(name.clone());

        Ok(BandAllocation {
            folder_name: name,
            folder_sequence: sequence,
            file_count,
        })
    }
}

/// Derives the destination folder name for the `sequence`th folder of `band`.
///
/// The first folder keeps the bare band name, later ones get `_N` appended.
pub(crate) fn folder_name(band: &str, sequence: usize) -> String {
    if sequence <= 1 {
        band.to_string()
    } else {
        format!("{band}_{sequence}")
    }
}
