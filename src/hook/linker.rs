/*
 *  hook/linker.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Namespace-bypass primitive and the dynamic linker's error slot
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

//! The redirection primitive is injected through [`RedirectPrimitive`] so
//! the hook can run against the real platform ([`SystemLinker`]) or a fake.
//!
//! The linker keeps a single process-global "last error" slot. Nothing in
//! here locks it; callers that may race must serialise around the whole
//! clear/open/read sequence.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::fmt;
use std::ptr::{self, NonNull};
use log::{debug, error, info};

use super::error::PrimitiveError;
use super::request::RedirectionRequest;

/// Symbol exported by the namespace-bypass library
pub const PRIMITIVE_SYMBOL: &str = "adrenotools_open_libvulkan";

/// Load a custom driver from `customDriverDir`
pub const ADRENOTOOLS_DRIVER_CUSTOM: c_int = 1 << 0;

/// Redirect the driver's file accesses into `fileRedirectDir`
pub const ADRENOTOOLS_DRIVER_FILE_REDIRECT: c_int = 1 << 1;

/// `void *adrenotools_open_libvulkan(int dlopenMode, int featureFlags,
///     const char *tmpLibDir, const char *hookLibDir,
///     const char *customDriverDir, const char *customDriverName,
///     const char *fileRedirectDir, void **userMappingHandle)`
pub type OpenLibvulkanFn = unsafe extern "C" fn(
    dlopen_mode: c_int,
    feature_flags: c_int,
    tmp_lib_dir: *const c_char,
    hook_lib_dir: *const c_char,
    custom_driver_dir: *const c_char,
    custom_driver_name: *const c_char,
    file_redirect_dir: *const c_char,
    user_mapping_handle: *mut *mut c_void,
) -> *mut c_void;

/// Opaque handle to a loaded replacement driver.
///
/// Only its identity is ever used. There is no release: the driver stays
/// loaded for the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverHandle(NonNull<c_void>);

impl DriverHandle {
    /// `None` for the primitive's null sentinel
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(DriverHandle)
    }

    /// Address of the handle, for log correlation
    pub fn id(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Display for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.id())
    }
}

/// The external capability that intercepts the driver load
pub trait RedirectPrimitive {
    /// Discard whatever sits in the linker's last-error slot
    fn clear_error(&self);

    /// Read and consume the linker's last error
    fn take_error(&self) -> Option<String>;

    /// Load `request.driver_file_name` from `request.driver_dir` in place of
    /// the system driver. `None` if any step failed.
    fn open_redirected(&self, request: &RedirectionRequest<'_>) -> Option<DriverHandle>;
}

/// Empty the process-wide dlerror slot
pub fn clear_linker_error() {
    // dlerror() resets the slot as it reads it
    unsafe {
        libc::dlerror();
    }
}

/// Read and consume the process-wide dlerror slot
pub fn take_linker_error() -> Option<String> {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
    Some(text)
}

/// The primitive joins file names straight onto its directory arguments
fn dir_arg(dir: &str) -> Option<CString> {
    let mut owned = dir.to_string();
    if !owned.ends_with('/') {
        owned.push('/');
    }
    CString::new(owned).ok()
}

/// The real primitive, resolved from the process image or a shared library
#[cfg(unix)]
pub struct SystemLinker {
    /// Keeps the symbol below valid
    _library: libloading::os::unix::Library,
    open_libvulkan: OpenLibvulkanFn,
}

#[cfg(unix)]
impl SystemLinker {
    /// Find the primitive among the libraries already loaded by this process
    pub fn from_process() -> Result<Self, PrimitiveError> {
        let library = libloading::os::unix::Library::this();
        Self::resolve(library)
    }

    /// Load the library exporting the primitive and resolve it
    pub fn from_library(name: &str) -> Result<Self, PrimitiveError> {
        info!("Loading namespace-bypass library: {}", name);

        let library = unsafe {
            libloading::os::unix::Library::open(Some(name), libc::RTLD_NOW | libc::RTLD_GLOBAL)
                .map_err(|source| PrimitiveError::Library {
                    library: name.to_string(),
                    source,
                })?
        };

        Self::resolve(library)
    }

    fn resolve(library: libloading::os::unix::Library) -> Result<Self, PrimitiveError> {
        let open_libvulkan: OpenLibvulkanFn = unsafe {
            let symbol: libloading::os::unix::Symbol<OpenLibvulkanFn> = library
                .get(b"adrenotools_open_libvulkan\0")
                .map_err(|source| PrimitiveError::Symbol {
                    symbol: PRIMITIVE_SYMBOL,
                    source,
                })?;
            *symbol
        };

        debug!("Resolved {} at {:p}", PRIMITIVE_SYMBOL, open_libvulkan as *const c_void);

        Ok(SystemLinker {
            _library: library,
            open_libvulkan,
        })
    }
}

#[cfg(unix)]
impl RedirectPrimitive for SystemLinker {
    fn clear_error(&self) {
        clear_linker_error();
    }

    fn take_error(&self) -> Option<String> {
        take_linker_error()
    }

    fn open_redirected(&self, request: &RedirectionRequest<'_>) -> Option<DriverHandle> {
        let temp_dir = dir_arg(request.temp_dir)?;
        let hook_dir = dir_arg(request.hook_dir)?;
        let driver_dir = dir_arg(request.driver_dir)?;
        let driver_name = CString::new(request.driver_file_name).ok()?;

        let mut features = ADRENOTOOLS_DRIVER_CUSTOM;
        let file_redirect_dir = match request.file_redirect_dir {
            Some(dir) => {
                features |= ADRENOTOOLS_DRIVER_FILE_REDIRECT;
                Some(dir_arg(dir)?)
            }
            None => None,
        };

        let raw = unsafe {
            (self.open_libvulkan)(
                request.flags.bits(),
                features,
                temp_dir.as_ptr(),
                hook_dir.as_ptr(),
                driver_dir.as_ptr(),
                driver_name.as_ptr(),
                file_redirect_dir.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
                ptr::null_mut(),
            )
        };

        DriverHandle::from_raw(raw)
    }
}

/// Stands in when the primitive could not be resolved at all.
///
/// Every attempt fails without touching the linker, so it reports as the
/// no-linker-error category.
pub struct UnavailablePrimitive {
    reason: String,
}

impl UnavailablePrimitive {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<PrimitiveError> for UnavailablePrimitive {
    fn from(err: PrimitiveError) -> Self {
        Self::new(err.to_string())
    }
}

impl RedirectPrimitive for UnavailablePrimitive {
    fn clear_error(&self) {
        clear_linker_error();
    }

    fn take_error(&self) -> Option<String> {
        None
    }

    fn open_redirected(&self, _request: &RedirectionRequest<'_>) -> Option<DriverHandle> {
        error!("Namespace-bypass primitive unavailable: {}", self.reason);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_is_none() {
        assert!(DriverHandle::from_raw(ptr::null_mut()).is_none());
    }

    #[test]
    fn test_handle_identity() {
        let handle = DriverHandle::from_raw(0x7f00_1000 as *mut c_void).unwrap();
        assert_eq!(handle.id(), 0x7f00_1000);
        assert_eq!(handle.to_string(), "0x7f001000");
    }

    #[test]
    fn test_dir_arg_trailing_slash() {
        assert_eq!(dir_arg("/data/app/lib").unwrap().as_bytes(), b"/data/app/lib/");
        assert_eq!(dir_arg("/data/app/lib/").unwrap().as_bytes(), b"/data/app/lib/");
        assert!(dir_arg("/data/\0lib").is_none());
    }

    #[test]
    fn test_linker_error_slot_is_consumed() {
        let handle = unsafe { libc::dlopen(c"libvkredirect_does_not_exist.so".as_ptr(), libc::RTLD_NOW) };
        assert!(handle.is_null());

        let first = take_linker_error();
        assert!(first.is_some());
        assert!(take_linker_error().is_none());
    }

    #[test]
    fn test_clear_discards_stale_error() {
        let handle = unsafe { libc::dlopen(c"libvkredirect_does_not_exist.so".as_ptr(), libc::RTLD_NOW) };
        assert!(handle.is_null());

        clear_linker_error();
        assert!(take_linker_error().is_none());
    }

    #[test]
    fn test_missing_library_is_library_error() {
        let result = SystemLinker::from_library("libvkredirect_does_not_exist.so");
        assert!(matches!(result, Err(PrimitiveError::Library { .. })));
    }

    #[test]
    fn test_process_without_primitive_is_symbol_error() {
        let result = SystemLinker::from_process();
        assert!(matches!(result, Err(PrimitiveError::Symbol { symbol: PRIMITIVE_SYMBOL, .. })));
    }

    #[test]
    fn test_unavailable_primitive_reports_nothing() {
        let primitive = UnavailablePrimitive::new("symbol missing");
        let req = RedirectionRequest::new("/data/tmp", "/data/app/lib", "/data/drivers/turnip", "libturnip.so");
        assert!(primitive.open_redirected(&req).is_none());
        assert!(primitive.take_error().is_none());
        assert_eq!(primitive.reason(), "symbol missing");
    }
}
