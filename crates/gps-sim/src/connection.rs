//! Simulated connection
//!
//! A spawned script task drives the status of each connection. Closing
//! aborts the script; a connection that already tore itself down is not
//! counted again when its handle goes away.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gps_detect::{Connection, ConnectionStatus, EventSink};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::device::Script;
use crate::stats::SimStats;

#[derive(Debug)]
struct LiveState {
    status: ConnectionStatus,
    alive: bool,
}

#[derive(Debug, Clone)]
struct Shared {
    state: Arc<Mutex<LiveState>>,
    stats: SimStats,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectionStatus, events: &EventSink) {
        let mut state = self.lock();
        if !state.alive || state.status == status {
            return;
        }
        state.status = status;
        drop(state);
        events.status_changed(status);
    }

    fn self_destruct(&self, events: &EventSink) {
        let mut state = self.lock();
        if !state.alive {
            return;
        }
        state.alive = false;
        state.status = ConnectionStatus::NotConnected;
        drop(state);
        self.stats.record_self_destruct();
        events.destroyed();
    }

    /// Returns whether this call ended the connection
    fn close(&self) -> bool {
        let mut state = self.lock();
        if !state.alive {
            return false;
        }
        state.alive = false;
        state.status = ConnectionStatus::NotConnected;
        drop(state);
        self.stats.record_close();
        true
    }
}

/// Connection to a simulated device
#[derive(Debug)]
pub struct SimConnection {
    endpoint: String,
    baud: Option<u32>,
    shared: Shared,
    script: JoinHandle<()>,
}

impl SimConnection {
    pub(crate) fn open(
        endpoint: &str,
        baud: Option<u32>,
        script: Script,
        stats: SimStats,
        events: EventSink,
    ) -> Self {
        stats.record_open(endpoint, baud);
        let shared = Shared {
            state: Arc::new(Mutex::new(LiveState {
                status: ConnectionStatus::Connected,
                alive: true,
            })),
            stats,
        };
        let task = tokio::spawn(run_script(script, shared.clone(), events));
        Self {
            endpoint: endpoint.to_string(),
            baud,
            shared,
            script: task,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn baud(&self) -> Option<u32> {
        self.baud
    }

    /// Whether neither side has ended the connection yet
    pub fn is_alive(&self) -> bool {
        self.shared.lock().alive
    }
}

async fn run_script(script: Script, shared: Shared, events: EventSink) {
    match script {
        Script::Idle => {}
        Script::ValidFrames(after) => {
            tokio::time::sleep(after).await;
            shared.set_status(ConnectionStatus::DataReceived, &events);
            shared.set_status(ConnectionStatus::ValidFrameReceived, &events);
        }
        Script::Garbage(after) => {
            tokio::time::sleep(after).await;
            shared.set_status(ConnectionStatus::DataReceived, &events);
        }
        Script::Die(after) => {
            tokio::time::sleep(after).await;
            shared.self_destruct(&events);
        }
    }
}

impl Connection for SimConnection {
    fn status(&self) -> ConnectionStatus {
        self.shared.lock().status
    }

    fn close(self: Box<Self>) {
        drop(self);
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        self.script.abort();
        if self.shared.close() {
            debug!("Simulated {} closed", self.endpoint);
        }
    }
}
