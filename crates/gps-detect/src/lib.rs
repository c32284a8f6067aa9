//! GPS Receiver Auto-Detection Library
//!
//! This crate finds a working GPS receiver without being told where it is.
//! It walks an ordered list of candidate endpoints (platform location source,
//! local gpsd, serial ports), opens each one in turn (serial ports once per
//! baud rate) and gives every attempt a bounded window to report a valid data
//! frame. The first connection to do so is handed to the caller; everything
//! else is closed along the way.
//!
//! The crate does not talk to devices itself. Connections are produced by a
//! [`ConnectionFactory`]; see the `gps-link` crate for serial NMEA and gpsd
//! implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use gps_detect::{DetectionOutcome, Detector, DetectorConfig, SystemPortEnumerator};
//! use gps_link::LinkFactory;
//!
//! let detector = Detector::new(
//!     DetectorConfig::default(),
//!     None,
//!     &SystemPortEnumerator::new(),
//!     LinkFactory::new(),
//! )?;
//!
//! match detector.run().await {
//!     DetectionOutcome::Detected(found) => println!("GPS on {}", found.candidate),
//!     DetectionOutcome::Failed => println!("no GPS found"),
//! }
//! ```

pub mod candidate;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod detector;
pub mod error;
pub mod events;
pub mod scanner;

pub use candidate::{
    Candidate, Endpoint, NetworkEndpoint, DEFAULT_NETWORK_ENDPOINT, PLATFORM_SOURCE,
};
pub use config::{DetectorConfig, SerialSettings, DEFAULT_BAUD_RATES};
pub use connection::{
    AttemptId, Connection, ConnectionEvent, ConnectionFactory, ConnectionSlot, ConnectionStatus,
    EventSink,
};
pub use detector::{DetectedConnection, DetectionOutcome, Detector, DetectorHandle};
pub use error::DetectError;
pub use events::{AdvanceReason, DetectorEvent, SkipReason};
pub use scanner::{PortEnumerator, ScannerConfig, StaticPorts, SystemPortEnumerator};
