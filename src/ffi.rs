/*
 *  ffi.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  C ABI entry points for the host application
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

//! C-compatible entry points exported from the `cdylib`.
//!
//! The host's native bridge calls one of these once at startup:
//!
//! ```c
//! bool vkredirect_hook_driver(const char *temp_lib_dir,
//!                             const char *hook_lib_dir,
//!                             const char *custom_driver_dir,
//!                             const char *driver_file_name);
//! ```
//!
//! `false` means "keep using the platform driver". No panic crosses the
//! boundary and all strings stay owned by the caller.

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use env_logger::Env;
use log::{error, info};

use crate::hook::{self, RedirectionRequest};

/// Serialises attempts; the linker error slot is process-global
static HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Borrow a caller-owned C string as UTF-8
unsafe fn arg<'a>(name: &'static str, ptr: *const c_char) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| format!("{} is not valid UTF-8: {}", name, e))
}

/// Nullable variant of [`arg`]
unsafe fn opt_arg<'a>(name: &'static str, ptr: *const c_char) -> Result<Option<&'a str>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { arg(name, ptr) }.map(Some)
}

type HookArgs<'a> = (Option<&'a str>, &'a str, &'a str, &'a str, &'a str, Option<&'a str>);

unsafe fn hook_args<'a>(
    primitive_library: *const c_char,
    temp_lib_dir: *const c_char,
    hook_lib_dir: *const c_char,
    custom_driver_dir: *const c_char,
    driver_file_name: *const c_char,
    file_redirect_dir: *const c_char,
) -> Result<HookArgs<'a>, String> {
    unsafe {
        Ok((
            opt_arg("primitive_library", primitive_library)?,
            arg("temp_lib_dir", temp_lib_dir)?,
            arg("hook_lib_dir", hook_lib_dir)?,
            arg("custom_driver_dir", custom_driver_dir)?,
            arg("driver_file_name", driver_file_name)?,
            opt_arg("file_redirect_dir", file_redirect_dir)?,
        ))
    }
}

fn init_logging() {
    // the host may already have installed a logger
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

fn guarded<F>(f: F) -> bool
where
    F: FnOnce() -> bool,
{
    let _guard = HOOK_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(hooked) => hooked,
        Err(panic_info) => {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown error".to_string()
            };
            error!("Caught panic during driver redirection: {}", message);
            false
        }
    }
}

/// Redirect the Vulkan driver load, looking for the primitive in the
/// running process.
///
/// # Safety
///
/// Every pointer must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vkredirect_hook_driver(
    temp_lib_dir: *const c_char,
    hook_lib_dir: *const c_char,
    custom_driver_dir: *const c_char,
    driver_file_name: *const c_char,
) -> bool {
    unsafe {
        vkredirect_hook_driver_with(
            std::ptr::null(),
            temp_lib_dir,
            hook_lib_dir,
            custom_driver_dir,
            driver_file_name,
            std::ptr::null(),
        )
    }
}

/// As [`vkredirect_hook_driver`], with an optional library exporting the
/// primitive and an optional file-redirect directory (both nullable).
///
/// # Safety
///
/// Every pointer must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vkredirect_hook_driver_with(
    primitive_library: *const c_char,
    temp_lib_dir: *const c_char,
    hook_lib_dir: *const c_char,
    custom_driver_dir: *const c_char,
    driver_file_name: *const c_char,
    file_redirect_dir: *const c_char,
) -> bool {
    init_logging();

    let args = unsafe {
        hook_args(
            primitive_library,
            temp_lib_dir,
            hook_lib_dir,
            custom_driver_dir,
            driver_file_name,
            file_redirect_dir,
        )
    };

    let (library, temp, hooks, driver_dir, driver_name, redirect_dir) = match args {
        Ok(args) => args,
        Err(e) => {
            error!("Driver redirection not attempted: {}", e);
            return false;
        }
    };

    guarded(|| {
        let request = RedirectionRequest::new(temp, hooks, driver_dir, driver_name)
            .with_file_redirect_dir(redirect_dir);
        let outcome = hook::hook_system_driver(library, &request);
        if !outcome.succeeded() {
            info!("Continuing with the platform default Vulkan driver");
        }
        outcome.succeeded()
    })
}
