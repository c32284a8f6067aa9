//! Progress events emitted while a detection runs
//!
//! Observers (a CLI, a settings dialog) can follow the search through a
//! single event channel. The terminal outcome itself is returned from
//! [`crate::Detector::run`]; the `Detected` and `Failed` events only mirror it.

use std::fmt;

/// Why an attempt did not produce a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Serial port could not be opened
    OpenFailed(String),
    /// Platform location support is not compiled in
    PlatformUnsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed(reason) => write!(f, "open failed: {reason}"),
            Self::PlatformUnsupported => f.write_str("platform location not supported"),
        }
    }
}

/// Why a running attempt was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    /// First step of the run
    Start,
    /// Observation window elapsed without a valid frame
    Timeout,
    /// Status changed while no connection was owned
    StatusWithoutConnection,
    /// The connection tore itself down
    ExternalTeardown,
}

impl fmt::Display for AdvanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Timeout => "timeout",
            Self::StatusWithoutConnection => "status without connection",
            Self::ExternalTeardown => "connection destroyed",
        };
        f.write_str(s)
    }
}

/// Detection progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    /// A connection was opened and is being observed
    AttemptStarted {
        /// Candidate endpoint
        candidate: String,
        /// Baud rate for serial candidates
        baud: Option<u32>,
    },

    /// A candidate could not be opened and was skipped without waiting
    AttemptSkipped {
        /// Candidate endpoint
        candidate: String,
        /// Baud rate for serial candidates
        baud: Option<u32>,
        /// Why it was skipped
        reason: SkipReason,
    },

    /// An observed attempt was given up
    AttemptAbandoned {
        /// Candidate endpoint
        candidate: String,
        /// Baud rate for serial candidates
        baud: Option<u32>,
        /// Why it was given up
        reason: AdvanceReason,
    },

    /// A receiver was found
    Detected {
        /// Candidate endpoint
        candidate: String,
        /// Baud rate for serial candidates
        baud: Option<u32>,
    },

    /// All candidates were exhausted
    Failed {
        /// Number of connections opened during the run
        attempts: usize,
    },
}

impl DetectorEvent {
    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Detected { .. } | Self::Failed { .. })
    }

    /// Candidate the event refers to, if any
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::AttemptStarted { candidate, .. }
            | Self::AttemptSkipped { candidate, .. }
            | Self::AttemptAbandoned { candidate, .. }
            | Self::Detected { candidate, .. } => Some(candidate),
            Self::Failed { .. } => None,
        }
    }
}
