//! GPS Link Library
//!
//! Connections the detector can open against real hardware:
//!
//! - **Serial NMEA**: a `tokio-serial` port read as NMEA 0183 sentences
//! - **gpsd**: a TCP client that asks gpsd to relay raw NMEA
//!
//! Both run a reader task per connection that reports status changes
//! (`Connected`, `DataReceived`, `ValidFrameReceived`) to the detector and,
//! for serial ports, the port going away. After detection the winning
//! [`NmeaConnection`] can be recovered from the handed-off
//! `Box<dyn Connection>` and its sentences consumed.
//!
//! # Example
//!
//! ```rust
//! use gps_link::nmea::NmeaCodec;
//!
//! let mut codec = NmeaCodec::new();
//! codec.push_bytes(b"$GPRMC,,V,,,,,,,,,,N*53\r\n");
//!
//! let sentence = codec.next_sentence().unwrap().unwrap();
//! assert_eq!(sentence.address(), "GPRMC");
//! ```

pub mod error;
pub mod factory;
pub mod gpsd;
pub mod link;
pub mod nmea;
pub mod serial;
pub mod shared_io;

pub use error::{LinkError, ParseError};
pub use factory::LinkFactory;
pub use link::{spawn_stream_link, LinkTaskCommand, NmeaConnection};
pub use nmea::{NmeaCodec, Sentence};
