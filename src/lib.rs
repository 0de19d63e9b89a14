/*
 *  lib.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
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

//! Load a user-supplied Vulkan driver in place of the system one, without
//! touching the application or the system library registry.
//!
//! The host calls [`ffi::vkredirect_hook_driver`] (or
//! [`hook::hook_driver`] from Rust) once, early, before anything opens
//! Vulkan. `false` is not fatal: the process carries on with the platform
//! driver.

pub mod config;
pub mod ffi;
pub mod hook;

pub use hook::{hook_driver, RedirectPrimitive, RedirectionOutcome, RedirectionRequest};
#[cfg(unix)]
pub use hook::hook_system_driver;
