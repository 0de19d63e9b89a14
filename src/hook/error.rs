/*
 *  hook/error.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Failure taxonomy for driver redirection
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
use serde::Serialize;
use thiserror::Error;

use super::request::RequestError;

/// Fallback text used when a null handle comes back with nothing in the
/// linker's error slot.
pub const NO_LINKER_ERROR_MESSAGE: &str =
    "no linker error captured - substitution likely blocked before reaching the linker, \
     e.g. namespace-bypass setup failure";

/// Why a redirection attempt did not produce a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCategory {
    /// Request could not be handed to the primitive
    InvalidRequest(RequestError),

    /// Primitive returned null and the linker reported why
    LinkerError(String),

    /// Primitive returned null and the linker had nothing to say
    NoLinkerError,
}

impl FailureCategory {
    /// Stable name used in the diagnostic record
    pub fn name(&self) -> &'static str {
        match self {
            FailureCategory::InvalidRequest(_) => "InvalidRequest",
            FailureCategory::LinkerError(_) => "RedirectionFailure-WithLinkerError",
            FailureCategory::NoLinkerError => "RedirectionFailure-NoLinkerError",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::InvalidRequest(err) =>
                write!(f, "Invalid redirection request: {}", err),
            FailureCategory::LinkerError(msg) =>
                write!(f, "Linker rejected the replacement driver: {}", msg),
            FailureCategory::NoLinkerError =>
                write!(f, "{}", NO_LINKER_ERROR_MESSAGE),
        }
    }
}

impl Serialize for FailureCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Errors setting up the system primitive before any attempt is made
#[derive(Debug, Error)]
pub enum PrimitiveError {
    #[error("failed to load primitive library {library}: {source}")]
    Library {
        library: String,
        #[source]
        source: libloading::Error,
    },

    #[error("primitive symbol {symbol} not found: {source}")]
    Symbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(FailureCategory::NoLinkerError.name(), "RedirectionFailure-NoLinkerError");
        assert_eq!(
            FailureCategory::LinkerError("dlopen failed".into()).name(),
            "RedirectionFailure-WithLinkerError"
        );
        assert_eq!(
            FailureCategory::InvalidRequest(RequestError::Empty("temp_lib_dir")).name(),
            "InvalidRequest"
        );
    }

    #[test]
    fn test_no_linker_error_is_named_not_blank() {
        let text = FailureCategory::NoLinkerError.to_string();
        assert!(text.starts_with("no linker error captured"));
    }

    #[test]
    fn test_linker_error_verbatim() {
        let msg = "dlopen failed: library \"libturnip.so\" not found";
        let text = FailureCategory::LinkerError(msg.into()).to_string();
        assert!(text.ends_with(msg));
    }
}
