//! Detection state machine
//!
//! The detector walks the candidate list, opening one connection at a time
//! and giving each a bounded observation window to report a valid frame.
//! Two kinds of wake-ups drive it, both on a single task: events from the
//! current connection and the expiry of the observation deadline. Both go
//! through [`Detector::advance`] or [`Detector::observe`], so there is exactly
//! one place where the owned connection is replaced.
//!
//! ```text
//! Idle ──advance──▶ Attempting ──valid frame──▶ Succeeded
//!                    │  ▲
//!                    └──┘ timeout / teardown
//!                    │
//!                    └──candidates exhausted──▶ Failed
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::candidate::{default_candidates, Candidate, Endpoint};
use crate::config::{DetectorConfig, SerialSettings};
use crate::connection::{
    AttemptId, Connection, ConnectionEvent, ConnectionFactory, ConnectionSlot, EventSink,
};
use crate::cursor::{AttemptCursor, AttemptPosition};
use crate::error::DetectError;
use crate::events::{AdvanceReason, DetectorEvent, SkipReason};
use crate::scanner::PortEnumerator;

/// A working connection handed over by the detector
#[derive(Debug)]
pub struct DetectedConnection {
    /// Candidate the connection was opened for
    pub candidate: Candidate,
    /// Baud rate, for serial candidates
    pub baud: Option<u32>,
    /// The live connection, now owned by the caller
    pub connection: Box<dyn Connection>,
}

/// Terminal outcome of a detection run
#[derive(Debug)]
pub enum DetectionOutcome {
    /// A receiver produced a valid frame
    Detected(DetectedConnection),
    /// All candidates were exhausted
    Failed,
}

impl DetectionOutcome {
    /// Whether a receiver was found
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }

    /// The detected connection, if any
    pub fn into_detected(self) -> Option<DetectedConnection> {
        match self {
            Self::Detected(detected) => Some(detected),
            Self::Failed => None,
        }
    }
}

/// Attempt currently being observed
#[derive(Debug, Clone)]
struct CurrentAttempt {
    id: AttemptId,
    position: AttemptPosition,
    baud: Option<u32>,
}

/// Result of a transition
#[derive(Debug)]
enum Step {
    /// A connection is installed; wait until `deadline`
    Observing { deadline: Instant },
    /// Nothing left to try
    Exhausted,
}

/// Result of handling a connection event
#[derive(Debug)]
enum Observation {
    /// Keep waiting in the current window
    Wait,
    /// Give up on the current attempt
    Advance(AdvanceReason),
    /// Hand the connection over
    Detected(DetectedConnection),
}

/// GPS receiver auto-detector
///
/// Single use: [`Detector::run`] consumes the detector and resolves to one
/// terminal outcome. Dropping a detector (or its future) closes the
/// connection it currently owns.
pub struct Detector<F: ConnectionFactory> {
    config: DetectorConfig,
    candidates: Vec<Candidate>,
    cursor: AttemptCursor,
    factory: F,
    slot: ConnectionSlot,
    current: Option<CurrentAttempt>,
    next_attempt: u64,
    opened: usize,
    event_tx: mpsc::UnboundedSender<(AttemptId, ConnectionEvent)>,
    event_rx: mpsc::UnboundedReceiver<(AttemptId, ConnectionEvent)>,
    progress: Option<mpsc::UnboundedSender<DetectorEvent>>,
}

impl<F: ConnectionFactory> Detector<F> {
    /// Create a detector
    ///
    /// With `port` set (and non-empty) the candidate list is exactly that
    /// endpoint. Otherwise it is the platform source (when the factory
    /// supports one), the configured network endpoint and every port the
    /// enumerator reports, in that order.
    pub fn new(
        config: DetectorConfig,
        port: Option<&str>,
        enumerator: &dyn PortEnumerator,
        factory: F,
    ) -> Result<Self, DetectError> {
        config.validate()?;

        let candidates = match port.filter(|p| !p.is_empty()) {
            Some(port) => vec![Candidate::user_specified(port)?],
            None => default_candidates(
                factory.supports_platform(),
                &config.network_endpoint,
                enumerator.available_ports(),
            )?,
        };

        Self::with_candidates(config, candidates, factory)
    }

    /// Create a detector over an explicit candidate list
    pub fn with_candidates(
        config: DetectorConfig,
        candidates: Vec<Candidate>,
        factory: F,
    ) -> Result<Self, DetectError> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            cursor: AttemptCursor::new(config.baud_rates.len()),
            config,
            candidates,
            factory,
            slot: ConnectionSlot::new(),
            current: None,
            next_attempt: 1,
            opened: 0,
            event_tx,
            event_rx,
            progress: None,
        })
    }

    /// Report progress on `tx`
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<DetectorEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Candidates in the order they will be tried
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Configuration in use
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the search to its terminal outcome
    pub async fn run(mut self) -> DetectionOutcome {
        info!(
            "Starting GPS detection over {} candidate(s)",
            self.candidates.len()
        );

        let mut reason = AdvanceReason::Start;
        loop {
            let deadline = match self.advance(reason) {
                Step::Observing { deadline } => deadline,
                Step::Exhausted => return DetectionOutcome::Failed,
            };

            let sleep = sleep_until(deadline);
            tokio::pin!(sleep);

            reason = loop {
                let wake = tokio::select! {
                    Some((attempt, event)) = self.event_rx.recv() => Some((attempt, event)),
                    _ = &mut sleep => None,
                };

                let Some((attempt, event)) = wake else {
                    break AdvanceReason::Timeout;
                };

                match self.observe(attempt, event) {
                    Observation::Wait => continue,
                    Observation::Advance(reason) => break reason,
                    Observation::Detected(detected) => {
                        return DetectionOutcome::Detected(detected);
                    }
                }
            };
        }
    }

    /// Run the search on a tokio task
    pub fn spawn(self) -> DetectorHandle
    where
        F: 'static,
    {
        DetectorHandle {
            task: tokio::spawn(self.run()),
        }
    }

    /// Drop the current attempt and open the next one that can be opened
    fn advance(&mut self, reason: AdvanceReason) -> Step {
        if let Some(current) = self.current.take() {
            debug!("Abandoning attempt {} ({})", current.id, reason);
            let candidate = self.candidate_id(current.position);
            self.emit(DetectorEvent::AttemptAbandoned {
                candidate,
                baud: current.baud,
                reason,
            });
        }
        self.slot.destroy();

        loop {
            let Some(position) = self.cursor.advance(&self.candidates) else {
                return self.fail();
            };

            let candidate = self.candidates[position.port_index].clone();
            let baud = position.baud_index.map(|i| self.config.baud_rates[i]);
            let id = AttemptId(self.next_attempt);
            self.next_attempt += 1;
            let sink = EventSink::new(id, self.event_tx.clone());

            let opened = match &candidate.endpoint {
                Endpoint::Network(net) => Ok(self.factory.open_network(net, sink)),
                Endpoint::Platform => self
                    .factory
                    .open_platform(sink)
                    .ok_or(SkipReason::PlatformUnsupported),
                Endpoint::Serial { path } => {
                    let settings = SerialSettings::new(baud.unwrap_or(self.config.baud_rates[0]));
                    self.factory
                        .open_serial(path, settings, sink)
                        .map_err(|e| SkipReason::OpenFailed(e.to_string()))
                }
            };

            match opened {
                Ok(connection) => {
                    debug!(
                        "Attempt {}: observing {} {}",
                        id,
                        candidate,
                        baud.map(|b| format!("at {b} baud")).unwrap_or_default()
                    );
                    self.slot.install(id, connection);
                    self.opened += 1;
                    self.current = Some(CurrentAttempt { id, position, baud });
                    self.emit(DetectorEvent::AttemptStarted {
                        candidate: candidate.id,
                        baud,
                    });

                    let window = self.config.window_for(&candidate.endpoint);
                    return Step::Observing {
                        deadline: Instant::now() + window,
                    };
                }
                Err(reason) => {
                    if reason == SkipReason::PlatformUnsupported {
                        warn!("Platform location source listed but not supported, skipping");
                    } else {
                        debug!("Skipping {} ({})", candidate, reason);
                    }
                    self.emit(DetectorEvent::AttemptSkipped {
                        candidate: candidate.id,
                        baud,
                        reason,
                    });
                }
            }
        }
    }

    /// React to an event from a connection
    fn observe(&mut self, attempt: AttemptId, event: ConnectionEvent) -> Observation {
        let Some(current) = self.current.as_ref() else {
            return Observation::Wait;
        };
        if current.id != attempt {
            debug!("Ignoring {:?} from stale attempt {}", event, attempt);
            return Observation::Wait;
        }

        match event {
            ConnectionEvent::Destroyed => {
                self.slot.forget(attempt);
                debug!("Connection for attempt {} destroyed itself", attempt);
                Observation::Advance(AdvanceReason::ExternalTeardown)
            }
            ConnectionEvent::StatusChanged(status) => {
                if self.slot.is_empty() {
                    return Observation::Advance(AdvanceReason::StatusWithoutConnection);
                }
                if !status.has_valid_frame() {
                    debug!("Attempt {} status now {:?}", attempt, status);
                    return Observation::Wait;
                }
                match self.hand_off() {
                    Some(detected) => Observation::Detected(detected),
                    None => Observation::Advance(AdvanceReason::StatusWithoutConnection),
                }
            }
        }
    }

    /// Transfer the owned connection to the caller and terminate
    fn hand_off(&mut self) -> Option<DetectedConnection> {
        let current = self.current.take()?;
        let connection = self.slot.take()?;
        let candidate = self.candidates[current.position.port_index].clone();

        info!(
            "Detected GPS on {}{}",
            candidate,
            current
                .baud
                .map(|b| format!(" at {b} baud"))
                .unwrap_or_default()
        );
        self.emit(DetectorEvent::Detected {
            candidate: candidate.id.clone(),
            baud: current.baud,
        });

        Some(DetectedConnection {
            candidate,
            baud: current.baud,
            connection,
        })
    }

    fn fail(&mut self) -> Step {
        info!(
            "GPS detection failed: {} candidate(s) exhausted after {} connection(s)",
            self.candidates.len(),
            self.opened
        );
        self.emit(DetectorEvent::Failed {
            attempts: self.opened,
        });
        Step::Exhausted
    }

    fn candidate_id(&self, position: AttemptPosition) -> String {
        self.candidates[position.port_index].id.clone()
    }

    fn emit(&self, event: DetectorEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

/// Handle to a detector running on its own task
#[derive(Debug)]
pub struct DetectorHandle {
    task: JoinHandle<DetectionOutcome>,
}

impl DetectorHandle {
    /// Wait for the outcome; `None` if the run was aborted
    pub async fn outcome(self) -> Option<DetectionOutcome> {
        match self.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                warn!("Detector task ended abnormally: {}", e);
                None
            }
        }
    }

    /// Stop the search, closing any connection under observation
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Whether the run has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
