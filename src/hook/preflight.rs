/*
 *  hook/preflight.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Preflight checks - is the bait where the primitive expects it
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use serde::Serialize;

/// Result of an existence check on one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPresence {
    pub present: bool,
    pub checked_path: PathBuf,
}

/// The bait is checked exactly like any other artifact
pub type BaitPresence = ArtifactPresence;

/// Metadata only, never opens the file. Permission errors count as absent.
fn check_artifact(path: PathBuf) -> ArtifactPresence {
    let present = match fs::metadata(&path) {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            debug!("{}: {}", path.display(), e);
            false
        }
    };

    ArtifactPresence { present, checked_path: path }
}

/// Check for the bait artifact `bait_name` inside `hook_dir`.
///
/// A missing directory is a result, not an error.
pub fn validate_bait<P: AsRef<Path>>(hook_dir: P, bait_name: &str) -> BaitPresence {
    let presence = check_artifact(hook_dir.as_ref().join(bait_name));

    if presence.present {
        debug!("Bait artifact present at {}", presence.checked_path.display());
    } else {
        warn!(
            "MissingArtifact: bait not present/not usable at {}",
            presence.checked_path.display()
        );
    }

    presence
}

/// Check for the replacement driver file inside `driver_dir`
pub fn validate_driver<P: AsRef<Path>>(driver_dir: P, driver_file_name: &str) -> ArtifactPresence {
    let presence = check_artifact(driver_dir.as_ref().join(driver_file_name));

    if presence.present {
        debug!("Replacement driver present at {}", presence.checked_path.display());
    } else {
        warn!(
            "Replacement driver not present/not usable at {}",
            presence.checked_path.display()
        );
    }

    presence
}
