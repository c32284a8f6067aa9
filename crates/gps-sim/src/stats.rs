//! Instrumentation shared by a simulated factory and its connections

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// One open attempt as seen by the simulated hardware
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimAttempt {
    /// Endpoint that was opened
    pub endpoint: String,
    /// Baud rate requested, for serial endpoints
    pub baud: Option<u32>,
    /// Whether the open succeeded
    pub opened: bool,
}

/// Counters at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimSnapshot {
    /// Connections opened
    pub opens: usize,
    /// Connections closed by their owner
    pub closes: usize,
    /// Connections that tore themselves down
    pub self_destructs: usize,
    /// Connections currently alive
    pub alive: usize,
    /// Highest `alive` ever observed
    pub max_alive: usize,
}

#[derive(Debug, Default)]
struct StatsInner {
    counters: SimSnapshot,
    attempts: Vec<SimAttempt>,
}

/// Cloneable handle to the counters of a simulation
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    inner: Arc<Mutex<StatsInner>>,
}

impl SimStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_open(&self, endpoint: &str, baud: Option<u32>) {
        let mut inner = self.lock();
        inner.counters.opens += 1;
        inner.counters.alive += 1;
        inner.counters.max_alive = inner.counters.max_alive.max(inner.counters.alive);
        inner.attempts.push(SimAttempt {
            endpoint: endpoint.to_string(),
            baud,
            opened: true,
        });
    }

    pub(crate) fn record_refused(&self, endpoint: &str, baud: Option<u32>) {
        self.lock().attempts.push(SimAttempt {
            endpoint: endpoint.to_string(),
            baud,
            opened: false,
        });
    }

    pub(crate) fn record_close(&self) {
        let mut inner = self.lock();
        inner.counters.closes += 1;
        inner.counters.alive = inner.counters.alive.saturating_sub(1);
    }

    pub(crate) fn record_self_destruct(&self) {
        let mut inner = self.lock();
        inner.counters.self_destructs += 1;
        inner.counters.alive = inner.counters.alive.saturating_sub(1);
    }

    /// Current counters
    pub fn snapshot(&self) -> SimSnapshot {
        self.lock().counters.clone()
    }

    /// Every open attempt so far, in order
    pub fn attempts(&self) -> Vec<SimAttempt> {
        self.lock().attempts.clone()
    }

    pub fn opens(&self) -> usize {
        self.lock().counters.opens
    }

    pub fn closes(&self) -> usize {
        self.lock().counters.closes
    }

    pub fn self_destructs(&self) -> usize {
        self.lock().counters.self_destructs
    }

    pub fn alive(&self) -> usize {
        self.lock().counters.alive
    }

    pub fn max_alive(&self) -> usize {
        self.lock().counters.max_alive
    }
}
