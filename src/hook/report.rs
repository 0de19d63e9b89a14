/*
 *  hook/report.rs
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Outcome reporting - one diagnostic record per attempt
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

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

use super::error::FailureCategory;
use super::linker::{DriverHandle, RedirectPrimitive};
use super::preflight::{ArtifactPresence, BaitPresence};
use super::request::{RedirectionRequest, ResolutionFlags};

/// Log target for the per-attempt diagnostic record
pub const DIAGNOSTIC_TARGET: &str = "vkredirect::diagnostic";

/// What happened to one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    Success(DriverHandle),
    Failure(FailureCategory),
}

/// Serialised form of one attempt, emitted once per invocation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    pub outcome: &'static str,
    pub temp_lib_dir: String,
    pub hook_lib_dir: String,
    pub custom_driver_dir: String,
    pub driver_file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_redirect_dir: Option<String>,
    pub resolution_flags: ResolutionFlags,
    pub bait: BaitPresence,
    pub driver: ArtifactPresence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Everything one call produced; built and handed back, never retained
#[derive(Debug, Clone)]
pub struct RedirectionOutcome {
    pub kind: OutcomeKind,
    pub record: DiagnosticRecord,
}

impl RedirectionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.kind, OutcomeKind::Success(_))
    }

    pub fn handle(&self) -> Option<DriverHandle> {
        match self.kind {
            OutcomeKind::Success(handle) => Some(handle),
            OutcomeKind::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureCategory> {
        match &self.kind {
            OutcomeKind::Success(_) => None,
            OutcomeKind::Failure(category) => Some(category),
        }
    }

    /// Linker error text or fallback category, `None` on success
    pub fn diagnostic_message(&self) -> Option<&str> {
        self.record.message.as_deref()
    }

    /// The bait check made before the attempt
    pub fn bait(&self) -> &BaitPresence {
        &self.record.bait
    }
}

/// Preflight results carried into the record
#[derive(Debug, Clone)]
pub struct Preflight {
    pub bait: BaitPresence,
    pub driver: ArtifactPresence,
}

/// Turn the primitive's result into an outcome.
///
/// On a null handle the linker's error slot is read before anything else
/// can touch it.
pub fn report<R: RedirectPrimitive + ?Sized>(
    primitive: &R,
    handle: Option<DriverHandle>,
    request: &RedirectionRequest<'_>,
    preflight: Preflight,
) -> RedirectionOutcome {
    let kind = match handle {
        Some(handle) => OutcomeKind::Success(handle),
        None => match primitive.take_error() {
            Some(msg) => OutcomeKind::Failure(FailureCategory::LinkerError(msg)),
            None => OutcomeKind::Failure(FailureCategory::NoLinkerError),
        },
    };

    finish(kind, request, preflight)
}

/// Build the record, log it once, hand the outcome back
pub(crate) fn finish(
    kind: OutcomeKind,
    request: &RedirectionRequest<'_>,
    preflight: Preflight,
) -> RedirectionOutcome {
    let (outcome, handle, failure, message) = match &kind {
        OutcomeKind::Success(handle) => ("Success", Some(handle.to_string()), None, None),
        OutcomeKind::Failure(category) => {
            let message = match category {
                FailureCategory::LinkerError(msg) => msg.clone(),
                other => other.to_string(),
            };
            (category.name(), None, Some(category.clone()), Some(message))
        }
    };

    let record = DiagnosticRecord {
        timestamp: Utc::now(),
        outcome,
        temp_lib_dir: request.temp_dir.to_string(),
        hook_lib_dir: request.hook_dir.to_string(),
        custom_driver_dir: request.driver_dir.to_string(),
        driver_file_name: request.driver_file_name.to_string(),
        file_redirect_dir: request.file_redirect_dir.map(str::to_string),
        resolution_flags: request.flags,
        bait: preflight.bait,
        driver: preflight.driver,
        handle,
        failure,
        message,
    };

    let body = serde_json::to_string(&record).unwrap_or_else(|e| format!("{:?} ({})", record, e));
    match &kind {
        OutcomeKind::Success(handle) => {
            info!(target: DIAGNOSTIC_TARGET, "Driver substituted, handle {}: {}", handle, body);
        }
        OutcomeKind::Failure(category) => {
            error!(target: DIAGNOSTIC_TARGET, "Driver substitution failed ({}): {}", category.name(), body);
        }
    }

    RedirectionOutcome { kind, record }
}
