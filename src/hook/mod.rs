/*
 *  hook/mod.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Driver redirection - preflight, invoke, report
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

//! Redirect the process's Vulkan driver load to a user-supplied driver
//!
//! One attempt runs three steps in order:
//!
//! 1. **Preflight** (`preflight.rs`) - is the bait where the primitive
//!    expects it? Absence is logged as `MissingArtifact` but never stops
//!    the attempt.
//! 2. **Invoke** - clear the linker's error slot, call the
//!    namespace-bypass primitive (`linker.rs`).
//! 3. **Report** (`report.rs`) - read the error slot straight away on a
//!    null handle, emit one diagnostic record, return the outcome.
//!
//! ## Repeated calls
//!
//! A successful redirection mutates the process's linker namespaces for
//! good. A second call in the same process is not guaranteed to mirror the
//! first; it is only deterministic for the same inputs and primitive state.
//!
//! ## Threads
//!
//! The linker error slot is process-global. Concurrent callers must
//! serialise the whole call themselves.

pub mod error;
pub mod linker;
pub mod preflight;
pub mod report;
pub mod request;

use log::{error, info};

pub use error::{FailureCategory, PrimitiveError, NO_LINKER_ERROR_MESSAGE};
pub use linker::{DriverHandle, RedirectPrimitive, UnavailablePrimitive};
#[cfg(unix)]
pub use linker::SystemLinker;
pub use preflight::{validate_bait, validate_driver, ArtifactPresence, BaitPresence};
pub use report::{DiagnosticRecord, OutcomeKind, Preflight, RedirectionOutcome, DIAGNOSTIC_TARGET};
pub use request::{RedirectionRequest, RequestError, ResolutionFlags, DEFAULT_BAIT_NAME};

/// Clear the error slot, then run the primitive once
pub fn redirect<R: RedirectPrimitive + ?Sized>(
    primitive: &R,
    request: &RedirectionRequest<'_>,
) -> Option<DriverHandle> {
    info!(
        "Invoking namespace-bypass primitive: driver {} from {} (hooks {}, staging {}, flags {})",
        request.driver_file_name,
        request.driver_dir,
        request.hook_dir,
        request.temp_dir,
        request.flags,
    );

    // nothing may run between the clear and the call
    primitive.clear_error();
    primitive.open_redirected(request)
}

/// Run one full redirection attempt. Never fails, never panics on bad input.
pub fn hook_driver<R: RedirectPrimitive + ?Sized>(
    primitive: &R,
    request: &RedirectionRequest<'_>,
) -> RedirectionOutcome {
    let preflight = Preflight {
        bait: validate_bait(request.hook_dir, request.bait_name),
        driver: validate_driver(request.driver_dir, request.driver_file_name),
    };

    if let Err(e) = request.validate() {
        error!("Refusing redirection request: {}", e);
        return report::finish(
            OutcomeKind::Failure(FailureCategory::InvalidRequest(e)),
            request,
            preflight,
        );
    }

    let handle = redirect(primitive, request);
    report::report(primitive, handle, request, preflight)
}

/// Resolve the real primitive and run one attempt with it.
///
/// `primitive_library` names the shared library exporting the primitive;
/// `None` looks in the running process image. A primitive that cannot be
/// resolved still yields an outcome (no linker error captured).
#[cfg(unix)]
pub fn hook_system_driver(
    primitive_library: Option<&str>,
    request: &RedirectionRequest<'_>,
) -> RedirectionOutcome {
    let resolved = match primitive_library {
        Some(name) => SystemLinker::from_library(name),
        None => SystemLinker::from_process(),
    };

    match resolved {
        Ok(linker) => hook_driver(&linker, request),
        Err(e) => {
            error!("Namespace-bypass setup failed: {}", e);
            hook_driver(&UnavailablePrimitive::from(e), request)
        }
    }
}
