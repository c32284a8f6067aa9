//! NMEA connection shared by serial ports and gpsd
//!
//! Every connection runs a reader task that feeds received bytes through an
//! [`NmeaCodec`], tracks the connection status and forwards valid sentences.
//! The [`NmeaConnection`] handle is what the detector owns; dropping or
//! closing it stops the task.

use std::any::Any;
use std::fmt;

use gps_detect::{Connection, ConnectionStatus, EventSink};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::nmea::{NmeaCodec, Sentence};
use crate::shared_io::SharedIo;

/// Sentences buffered for the consumer before new ones are dropped
pub const SENTENCE_BUFFER: usize = 256;

/// Read buffer size per connection
pub const READ_BUFFER: usize = 1024;

/// Commands that can be sent to a link task
#[derive(Debug)]
pub enum LinkTaskCommand {
    /// Shutdown the task
    Shutdown,
}

/// Why a reader loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadEnd {
    /// Shutdown requested or the stream was released by `close`
    Closed,
    /// The transport failed or reached end of file
    Lost,
}

/// Per-connection state owned by the reader task
pub(crate) struct LinkState {
    source: String,
    events: EventSink,
    status_tx: watch::Sender<ConnectionStatus>,
    codec: NmeaCodec,
    sentences_tx: mpsc::Sender<Sentence>,
}

impl LinkState {
    /// Set the status, notifying on change
    pub(crate) fn set(&mut self, status: ConnectionStatus) {
        if *self.status_tx.borrow() == status {
            return;
        }
        debug!("{} status {:?}", self.source, status);
        self.status_tx.send_replace(status);
        self.events.status_changed(status);
    }

    /// Raise the status; never moves it backwards
    fn upgrade(&mut self, status: ConnectionStatus) {
        if status > *self.status_tx.borrow() {
            self.set(status);
        }
    }

    /// Forget partially received data, e.g. after a reconnect
    pub(crate) fn reset(&mut self) {
        self.codec.clear();
        self.set(ConnectionStatus::NotConnected);
    }

    pub(crate) fn connected(&mut self) {
        self.upgrade(ConnectionStatus::Connected);
    }

    /// Report that the transport died on its own
    pub(crate) fn lost(&mut self) {
        info!("{} went away", self.source);
        self.status_tx.send_replace(ConnectionStatus::NotConnected);
        self.events.destroyed();
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    fn ingest(&mut self, data: &[u8]) {
        self.upgrade(ConnectionStatus::DataReceived);
        self.codec.push_bytes(data);
        while let Some(result) = self.codec.next_sentence() {
            match result {
                Ok(sentence) => {
                    trace!("{}: {}", self.source, sentence);
                    self.upgrade(ConnectionStatus::ValidFrameReceived);
                    if self.sentences_tx.try_send(sentence).is_err() {
                        trace!("{}: sentence buffer full or unread", self.source);
                    }
                }
                Err(e) => trace!("{}: discarding line: {}", self.source, e),
            }
        }
    }

    /// Pump `io` until it fails, is released, or shutdown is requested
    pub(crate) async fn read_loop<T>(
        &mut self,
        io: &SharedIo<T>,
        cmd_rx: &mut mpsc::Receiver<LinkTaskCommand>,
    ) -> ReadEnd
    where
        T: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; READ_BUFFER];
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(LinkTaskCommand::Shutdown) | None => return ReadEnd::Closed,
                    }
                }

                result = io.read(&mut buffer) => {
                    match result {
                        None => return ReadEnd::Closed,
                        Some(Ok(0)) => {
                            debug!("{}: end of stream", self.source);
                            return ReadEnd::Lost;
                        }
                        Some(Ok(n)) => self.ingest(&buffer[..n]),
                        Some(Err(e)) => {
                            warn!("Read error on {}: {}", self.source, e);
                            return ReadEnd::Lost;
                        }
                    }
                }
            }
        }
    }
}

/// Channel ends handed to a reader task
pub(crate) struct LinkTask {
    pub(crate) state: LinkState,
    pub(crate) cmd_rx: mpsc::Receiver<LinkTaskCommand>,
}

/// Handle to a running NMEA link
pub struct NmeaConnection {
    source: String,
    status: watch::Receiver<ConnectionStatus>,
    sentences: Option<mpsc::Receiver<Sentence>>,
    cmd_tx: mpsc::Sender<LinkTaskCommand>,
    release: Option<Box<dyn FnOnce() + Send>>,
    task: Option<JoinHandle<()>>,
}

impl NmeaConnection {
    /// Build the handle and the task-side state for a new link
    pub(crate) fn pair(
        source: impl Into<String>,
        initial: ConnectionStatus,
        events: EventSink,
    ) -> (Self, LinkTask) {
        let source = source.into();
        let (status_tx, status) = watch::channel(initial);
        let (sentences_tx, sentences) = mpsc::channel(SENTENCE_BUFFER);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);

        let connection = Self {
            source: source.clone(),
            status,
            sentences: Some(sentences),
            cmd_tx,
            release: None,
            task: None,
        };
        let task = LinkTask {
            state: LinkState {
                source,
                events,
                status_tx,
                codec: NmeaCodec::new(),
                sentences_tx,
            },
            cmd_rx,
        };
        (connection, task)
    }

    /// Run `release` synchronously when the connection is closed
    pub(crate) fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub(crate) fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Human-readable description of the transport
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Take the stream of valid sentences; only the first call gets it
    pub fn take_sentences(&mut self) -> Option<mpsc::Receiver<Sentence>> {
        self.sentences.take()
    }

    /// Wait for the reader task to finish after the link died
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

impl Connection for NmeaConnection {
    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn close(self: Box<Self>) {
        drop(self);
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl fmt::Debug for NmeaConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NmeaConnection")
            .field("source", &self.source)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl Drop for NmeaConnection {
    fn drop(&mut self) {
        debug!("Closing {}", self.source);
        if let Some(release) = self.release.take() {
            release();
        }
        let _ = self.cmd_tx.try_send(LinkTaskCommand::Shutdown);
    }
}

/// Spawn a reader task over an already open stream
///
/// The connection starts out `Connected`. When the stream fails the task
/// reports the teardown through the event sink; closing the connection
/// releases the stream immediately and stops the task silently.
pub fn spawn_stream_link<T>(
    source: impl Into<String>,
    stream: T,
    events: EventSink,
) -> NmeaConnection
where
    T: AsyncRead + Unpin + Send + 'static,
{
    let io = SharedIo::new(stream);
    let (connection, mut task) = NmeaConnection::pair(source, ConnectionStatus::Connected, events);

    let reader_io = io.clone();
    let handle = tokio::spawn(async move {
        let end = task.state.read_loop(&reader_io, &mut task.cmd_rx).await;
        if end == ReadEnd::Lost && !reader_io.is_released() {
            reader_io.release();
            task.state.lost();
        }
        debug!("Reader for {} stopped", task.state.source());
    });

    connection
        .on_release(move || io.release())
        .with_task(handle)
}
