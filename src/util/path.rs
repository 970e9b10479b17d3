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

use std::path::PathBuf;

/// Expands a leading `~` in `path` to the current user's home directory.
///
/// Paths without a leading `~`, or paths naming another user's home such as
/// `~bob/music`, are returned unchanged. If the home directory can not be
/// determined the path is also returned unchanged.
///
/// # Examples
///
/// ```ignore
/// // With a home directory of /home/kurt
/// assert_eq!(expand_home("~/Music"), PathBuf::from("/home/kurt/Music"));
/// assert_eq!(expand_home("/Volumes/Alpine"), PathBuf::from("/Volumes/Alpine"));
/// ```
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let rest = match path {
        "~" => "",
        _ => match path.strip_prefix("~/") {
            Some(rest) => rest,
            None => return PathBuf::from(path),
        },
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}
