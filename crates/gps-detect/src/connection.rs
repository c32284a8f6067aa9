//! Connection capability consumed by the detector
//!
//! The detector never talks to hardware itself. A [`ConnectionFactory`]
//! opens connections, each connection reports its status and its own
//! teardown through the [`EventSink`] it was opened with, and the detector
//! keeps at most one of them alive in a [`ConnectionSlot`].

use std::any::Any;
use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::candidate::NetworkEndpoint;
use crate::config::SerialSettings;
use crate::error::DetectError;

/// Identifier of one attempt within a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status reported by a connection, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionStatus {
    /// Transport not (yet) established
    #[default]
    NotConnected,
    /// Transport up, nothing received
    Connected,
    /// Bytes arrived but no complete valid frame yet
    DataReceived,
    /// At least one valid data frame arrived
    ValidFrameReceived,
}

impl ConnectionStatus {
    /// Whether this status proves a working receiver
    pub fn has_valid_frame(self) -> bool {
        matches!(self, Self::ValidFrameReceived)
    }
}

/// Notification sent by a connection to whoever observes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection's status changed
    StatusChanged(ConnectionStatus),
    /// The connection tore itself down (transport died)
    Destroyed,
}

/// Channel end a connection uses to report events for its attempt
///
/// Events are tagged with the attempt they belong to, so notifications from
/// a connection that has already been discarded can be told apart from the
/// current one. Sending never fails; once the observer is gone events are
/// dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<(AttemptId, ConnectionEvent)>,
}

impl EventSink {
    /// Create a sink for an attempt
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<(AttemptId, ConnectionEvent)>) -> Self {
        Self { attempt, tx }
    }

    /// Attempt this sink reports for
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Report a status change
    pub fn status_changed(&self, status: ConnectionStatus) {
        self.send(ConnectionEvent::StatusChanged(status));
    }

    /// Report that the connection tore itself down
    pub fn destroyed(&self) {
        self.send(ConnectionEvent::Destroyed);
    }

    /// Whether anyone is still listening
    pub fn is_observed(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, event: ConnectionEvent) {
        if self.tx.send((self.attempt, event)).is_err() {
            debug!("Dropping {:?} for attempt {}: observer gone", event, self.attempt);
        }
    }
}

/// A live link to a (possible) GPS receiver
pub trait Connection: Send + fmt::Debug {
    /// Current status
    fn status(&self) -> ConnectionStatus;

    /// Tear the connection down and release its OS resources
    ///
    /// Consumes the connection, so it can run at most once.
    fn close(self: Box<Self>);

    /// Convert into `Any` so callers can recover the concrete type
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Opens connections of each endpoint kind
pub trait ConnectionFactory: Send {
    /// Whether a platform location source is compiled in
    fn supports_platform(&self) -> bool;

    /// Open a network connection
    ///
    /// Never fails synchronously; the connection keeps trying to reach the
    /// service on its own and reports progress through `events`.
    fn open_network(&mut self, endpoint: &NetworkEndpoint, events: EventSink)
        -> Box<dyn Connection>;

    /// Open the platform location source, `None` when unsupported
    fn open_platform(&mut self, events: EventSink) -> Option<Box<dyn Connection>>;

    /// Open a serial port with the given frame format
    fn open_serial(
        &mut self,
        path: &str,
        settings: SerialSettings,
        events: EventSink,
    ) -> Result<Box<dyn Connection>, DetectError>;
}

struct ActiveConnection {
    attempt: AttemptId,
    connection: Box<dyn Connection>,
}

/// Slot holding at most one live connection
///
/// Installing closes any previous occupant first; dropping the slot closes
/// the occupant. A connection leaves the slot exactly one way: closed,
/// forgotten after its own teardown, or taken out for handoff.
#[derive(Default)]
pub struct ConnectionSlot {
    active: Option<ActiveConnection>,
}

impl ConnectionSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the slot is empty
    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    /// Attempt owning the current occupant
    pub fn attempt(&self) -> Option<AttemptId> {
        self.active.as_ref().map(|a| a.attempt)
    }

    /// Status of the current occupant
    pub fn status(&self) -> Option<ConnectionStatus> {
        self.active.as_ref().map(|a| a.connection.status())
    }

    /// Place a connection in the slot
    pub fn install(&mut self, attempt: AttemptId, connection: Box<dyn Connection>) {
        self.destroy();
        self.active = Some(ActiveConnection {
            attempt,
            connection,
        });
    }

    /// Close the occupant, if any. Returns whether something was closed.
    pub fn destroy(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                debug!("Closing connection for attempt {}", active.attempt);
                active.connection.close();
                true
            }
            None => false,
        }
    }

    /// Drop the occupant without closing it, after it tore itself down
    ///
    /// Only acts when `attempt` owns the occupant.
    pub fn forget(&mut self, attempt: AttemptId) -> bool {
        if self.attempt() == Some(attempt) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Remove the occupant for handoff; the slot no longer owns it
    pub fn take(&mut self) -> Option<Box<dyn Connection>> {
        self.active.take().map(|a| a.connection)
    }
}

impl fmt::Debug for ConnectionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSlot")
            .field("attempt", &self.attempt())
            .finish()
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.destroy();
    }
}
