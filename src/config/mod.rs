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

//! Application configuration.
//!
//! This module manages the application configuration file, which holds the
//! default music and destination directories along with the limits of the
//! target head unit.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::allocator::{MAX_FILES_PER_DIRECTORY, MAX_FOLDERS};

const CONFIG_NAME: &str = "alpinify";

/// The configuration layout written by this build.
const CONFIG_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub version: u32,
    pub music_dir: String,
    pub dest_dir: String,
    pub max_files_per_folder: usize,
    /// Total folders the head unit will index, no limit when absent.
    pub max_folders: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_dir: "~/Music/Albums".to_string(),
            dest_dir: "/Volumes/Alpine".to_string(),
            max_files_per_folder: MAX_FILES_PER_DIRECTORY,
            max_folders: Some(MAX_FOLDERS),
        }
    }
}

/// Loads the configuration file, falling back to the defaults if it can not be
/// read or was written by a newer version.
pub fn load_config() -> AppConfig {
    match confy::load(CONFIG_NAME, None) {
        Ok(cfg) => check_version(cfg),
        Err(e) => {
            warn!("Failed to load configuration, using defaults: {}", e);
            AppConfig::default()
        }
    }
}

// Settings written by a newer layout are ignored.
fn check_version(cfg: AppConfig) -> AppConfig {
    if cfg.version > CONFIG_VERSION {
        warn!(
            "Configuration version {} is newer than supported version {}, using defaults",
            cfg.version, CONFIG_VERSION
        );
        return AppConfig::default();
    }

    cfg
}

pub fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}
