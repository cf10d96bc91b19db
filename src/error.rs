//! Unified error type and exit codes for the featpress binary.
//!
//! Each subsystem has its own error enum ([`IngestError`], [`ProjectError`],
//! [`ResolveError`], [`RenderError`]); `From` impls bridge them into the
//! single [`PressError`] the CLI reports, and [`ExitCode`] maps that to a
//! stable process exit code:
//! - `2`: invalid input (unreadable log, malformed record)
//! - `3`: integrity fault (dangling id, duplicate id, finish without start)
//! - `4`: render or output failure
//! - `10`: internal fault (structural cycle in the projected store)

use std::fmt;

use thiserror::Error;

use crate::ingest::IngestError;
use crate::project::ProjectError;
use crate::render::RenderError;
use crate::resolve::ResolveError;

// ============================================================================
// Exit Codes
// ============================================================================

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Input could not be read or decoded.
    InvalidInput = 2,
    /// The event log violated a referential integrity rule.
    IntegrityFault = 3,
    /// The output document could not be produced.
    RenderFailed = 4,
    /// Internal fault (malformed store).
    InternalError = 10,
}

impl ExitCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error for CLI reporting.
#[derive(Debug, Error)]
pub enum PressError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to read narrative {path}: {source}")]
    NarrativeIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output {path}: {source}")]
    OutputIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<&PressError> for ExitCode {
    fn from(err: &PressError) -> Self {
        match err {
            PressError::Ingest(_) => ExitCode::InvalidInput,
            PressError::Project(ProjectError::Malformed { .. }) => ExitCode::InvalidInput,
            PressError::Project(_) => ExitCode::IntegrityFault,
            // A dangling reference is an integrity fault wherever it
            // surfaces; a cycle means the projector built a malformed
            // store, which is our bug.
            PressError::Resolve(ResolveError::Dangling(_)) => ExitCode::IntegrityFault,
            PressError::Resolve(ResolveError::Cycle(_)) => ExitCode::InternalError,
            PressError::Render(_) => ExitCode::RenderFailed,
            PressError::NarrativeIo { .. } => ExitCode::InvalidInput,
            PressError::OutputIo { .. } => ExitCode::RenderFailed,
        }
    }
}

impl PressError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
