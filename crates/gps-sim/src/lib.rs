//! GPS Receiver Simulation Library
//!
//! Stand-ins for hardware so detection can be exercised end to end:
//!
//! - **SimDevice**: scripted behaviour of one endpoint (silent, responding at
//!   a baud rate, busy, dying, sending garbage)
//! - **SimFactory**: a `ConnectionFactory` opening simulated connections
//! - **SimStats**: counters for opens, closes, self-teardowns and how many
//!   connections were alive at once
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gps_sim::{SimDevice, SimFactory};
//!
//! let factory = SimFactory::new()
//!     .with_device("/dev/ttyS0", SimDevice::Silent)
//!     .with_device("/dev/ttyUSB0", SimDevice::responds_at(38400, Duration::from_millis(200)));
//!
//! let stats = factory.stats();
//! assert_eq!(stats.opens(), 0);
//! ```

pub mod connection;
pub mod device;
pub mod factory;
pub mod stats;

pub use connection::SimConnection;
pub use device::SimDevice;
pub use factory::SimFactory;
pub use stats::{SimAttempt, SimSnapshot, SimStats};
