//! Scripted device behaviour
//!
//! Each simulated endpoint follows one script from the moment it is opened.
//! Delays are measured from the open, on the tokio clock, so tests running
//! with paused time are deterministic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a simulated endpoint behaves once opened
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimDevice {
    /// Opens fine and never sends anything
    #[default]
    Silent,

    /// Sends valid sentences after `after_ms`
    ///
    /// With `baud` set, only an open at that rate produces valid frames; any
    /// other rate yields garbage (data but no valid frame).
    Responds {
        baud: Option<u32>,
        after_ms: u64,
    },

    /// Open fails (port held by another process)
    Busy,

    /// Opens, then tears itself down after `after_ms`
    DiesAfter { after_ms: u64 },

    /// Sends bytes after `after_ms` but never a valid frame
    NoFix { after_ms: u64 },
}

impl SimDevice {
    /// Valid frames at exactly `baud`
    pub fn responds_at(baud: u32, after: Duration) -> Self {
        Self::Responds {
            baud: Some(baud),
            after_ms: millis(after),
        }
    }

    /// Valid frames at whatever rate it is opened with
    pub fn responds(after: Duration) -> Self {
        Self::Responds {
            baud: None,
            after_ms: millis(after),
        }
    }

    pub fn dies_after(after: Duration) -> Self {
        Self::DiesAfter {
            after_ms: millis(after),
        }
    }

    pub fn no_fix(after: Duration) -> Self {
        Self::NoFix {
            after_ms: millis(after),
        }
    }

    /// Whether opening this device fails
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// What happens after an open at `baud`
    pub(crate) fn script(&self, baud: Option<u32>) -> Script {
        match *self {
            Self::Silent | Self::Busy => Script::Idle,
            Self::Responds {
                baud: wanted,
                after_ms,
            } => {
                let after = Duration::from_millis(after_ms);
                if wanted.is_none() || wanted == baud {
                    Script::ValidFrames(after)
                } else {
                    Script::Garbage(after)
                }
            }
            Self::DiesAfter { after_ms } => Script::Die(Duration::from_millis(after_ms)),
            Self::NoFix { after_ms } => Script::Garbage(Duration::from_millis(after_ms)),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Resolved behaviour of one open connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    Idle,
    ValidFrames(Duration),
    Garbage(Duration),
    Die(Duration),
}
