/*
 *  hook/request.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Redirection request and resolution flags
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

use std::fmt;
use std::path::{Path, PathBuf};
use serde::Serialize;
use thiserror::Error;

/// File name the host process resolves for the system Vulkan driver.
pub const DEFAULT_BAIT_NAME: &str = "libvulkan_freedreno.so";

/// Problems with a request that stop the primitive from being called at all
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} contains an interior NUL byte")]
    InteriorNul(&'static str),
    #[error("resolution flags {0} must request eager binding and global visibility")]
    Flags(ResolutionFlags),
}

/// dlopen mode handed to the namespace-bypass primitive.
///
/// Global visibility is mandatory: the graphics pipeline resolves Vulkan
/// symbols later and must find them in the substituted driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionFlags(i32);

impl ResolutionFlags {
    pub const NOW: ResolutionFlags = ResolutionFlags(libc::RTLD_NOW);
    pub const LAZY: ResolutionFlags = ResolutionFlags(libc::RTLD_LAZY);
    pub const GLOBAL: ResolutionFlags = ResolutionFlags(libc::RTLD_GLOBAL);
    pub const LOCAL: ResolutionFlags = ResolutionFlags(libc::RTLD_LOCAL);

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn contains(self, other: ResolutionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Eager symbol binding requested (RTLD_NOW is 0 on 32-bit Android/bionic)
    pub fn is_eager(self) -> bool {
        if Self::NOW.0 == 0 {
            !self.contains(Self::LAZY)
        } else {
            self.contains(Self::NOW)
        }
    }

    /// Eager binding and global visibility both requested
    pub fn is_eager_global(self) -> bool {
        self.is_eager() && self.contains(Self::GLOBAL)
    }
}

impl Default for ResolutionFlags {
    fn default() -> Self {
        Self::NOW | Self::GLOBAL
    }
}

impl std::ops::BitOr for ResolutionFlags {
    type Output = ResolutionFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ResolutionFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ResolutionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        names.push(if self.is_eager() { "RTLD_NOW" } else { "RTLD_LAZY" });
        if self.contains(Self::GLOBAL) {
            names.push("RTLD_GLOBAL");
        }
        write!(f, "{} (0x{:x})", names.join("|"), self.0)
    }
}

impl Serialize for ResolutionFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One redirection attempt's inputs.
///
/// Borrowed for the duration of the call only; nothing here outlives
/// `hook_driver`.
#[derive(Debug, Clone, Copy)]
pub struct RedirectionRequest<'a> {
    /// Writable staging directory for patched libraries
    pub temp_dir: &'a str,

    /// Directory holding the bait and hook libraries
    pub hook_dir: &'a str,

    /// Directory holding the replacement driver
    pub driver_dir: &'a str,

    /// Replacement driver file name inside `driver_dir`
    pub driver_file_name: &'a str,

    /// Optional directory for the primitive's file-redirect feature
    pub file_redirect_dir: Option<&'a str>,

    pub flags: ResolutionFlags,

    /// Fixed file name of the bait artifact inside `hook_dir`
    pub bait_name: &'a str,
}

impl<'a> RedirectionRequest<'a> {
    pub fn new(
        temp_dir: &'a str,
        hook_dir: &'a str,
        driver_dir: &'a str,
        driver_file_name: &'a str,
    ) -> Self {
        Self {
            temp_dir,
            hook_dir,
            driver_dir,
            driver_file_name,
            file_redirect_dir: None,
            flags: ResolutionFlags::default(),
            bait_name: DEFAULT_BAIT_NAME,
        }
    }

    pub fn with_bait_name(mut self, bait_name: &'a str) -> Self {
        self.bait_name = bait_name;
        self
    }

    pub fn with_file_redirect_dir(mut self, dir: Option<&'a str>) -> Self {
        self.file_redirect_dir = dir;
        self
    }

    pub fn with_flags(mut self, flags: ResolutionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Path the bait artifact is expected at
    pub fn bait_path(&self) -> PathBuf {
        Path::new(self.hook_dir).join(self.bait_name)
    }

    /// Path the replacement driver is expected at
    pub fn driver_path(&self) -> PathBuf {
        Path::new(self.driver_dir).join(self.driver_file_name)
    }

    /// Check everything the primitive cannot be called without
    pub fn validate(&self) -> Result<(), RequestError> {
        let mut fields = vec![
            ("temp_lib_dir", self.temp_dir),
            ("hook_lib_dir", self.hook_dir),
            ("custom_driver_dir", self.driver_dir),
            ("driver_file_name", self.driver_file_name),
            ("bait_name", self.bait_name),
        ];
        if let Some(dir) = self.file_redirect_dir {
            fields.push(("file_redirect_dir", dir));
        }

        for (name, value) in fields {
            if value.is_empty() {
                return Err(RequestError::Empty(name));
            }
            if value.as_bytes().contains(&0) {
                return Err(RequestError::InteriorNul(name));
            }
        }

        if !self.flags.is_eager_global() {
            return Err(RequestError::Flags(self.flags));
        }

        Ok(())
    }
}
