//! Attempt cursor over candidates × baud rates

use crate::candidate::Candidate;

/// Position of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPosition {
    /// Index into the candidate list
    pub port_index: usize,
    /// Index into the baud list, `None` for candidates tried once
    pub baud_index: Option<usize>,
}

/// Cursor walking the cross product of candidates and baud rates
///
/// Serial candidates visit every baud index in order. Network and platform
/// candidates collapse the baud dimension onto its last index, so the next
/// step moves straight to the following candidate. The cursor only moves
/// forward and never passes the candidate count.
#[derive(Debug, Clone)]
pub struct AttemptCursor {
    port_index: usize,
    baud_index: Option<usize>,
    baud_count: usize,
}

impl AttemptCursor {
    /// Create a cursor positioned before the first attempt
    pub fn new(baud_count: usize) -> Self {
        Self {
            port_index: 0,
            baud_index: None,
            baud_count: baud_count.max(1),
        }
    }

    /// Current candidate index
    pub fn port_index(&self) -> usize {
        self.port_index
    }

    /// Whether the cursor has run off the end of `candidates`
    pub fn is_exhausted(&self, candidates: &[Candidate]) -> bool {
        self.port_index >= candidates.len()
    }

    /// Step to the next attempt, or `None` once every candidate is used up
    pub fn advance(&mut self, candidates: &[Candidate]) -> Option<AttemptPosition> {
        if self.is_exhausted(candidates) {
            return None;
        }

        let next = self.baud_index.map_or(0, |i| i + 1);
        if next == self.baud_count {
            self.baud_index = Some(0);
            self.port_index += 1;
        } else {
            self.baud_index = Some(next);
        }

        let candidate = candidates.get(self.port_index)?;

        if candidate.endpoint.is_serial() {
            Some(AttemptPosition {
                port_index: self.port_index,
                baud_index: self.baud_index,
            })
        } else {
            self.baud_index = Some(self.baud_count - 1);
            Some(AttemptPosition {
                port_index: self.port_index,
                baud_index: None,
            })
        }
    }
}
