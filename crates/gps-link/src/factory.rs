//! Connection factory backed by real serial ports and gpsd

use gps_detect::{
    Connection, ConnectionFactory, DetectError, EventSink, NetworkEndpoint, SerialSettings,
};
use tracing::debug;

use crate::gpsd::connect_gpsd;
use crate::serial::open_serial_link;

/// Opens serial NMEA and gpsd links
///
/// No platform location adapter is built in, so the platform source is
/// reported as unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkFactory;

impl LinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for LinkFactory {
    fn supports_platform(&self) -> bool {
        false
    }

    fn open_network(&mut self, endpoint: &NetworkEndpoint, events: EventSink) -> Box<dyn Connection> {
        debug!("Opening gpsd link to {} for attempt {}", endpoint, events.attempt());
        Box::new(connect_gpsd(endpoint, events))
    }

    fn open_platform(&mut self, _events: EventSink) -> Option<Box<dyn Connection>> {
        None
    }

    fn open_serial(
        &mut self,
        path: &str,
        settings: SerialSettings,
        events: EventSink,
    ) -> Result<Box<dyn Connection>, DetectError> {
        let link = open_serial_link(path, settings, events)?;
        Ok(Box::new(link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gps_detect::AttemptId;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_platform_unsupported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut factory = LinkFactory::new();
        assert!(!factory.supports_platform());
        assert!(factory
            .open_platform(EventSink::new(AttemptId(1), tx))
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_serial_port_is_open_failure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = LinkFactory::new().open_serial(
            "/dev/does-not-exist-gps",
            SerialSettings::new(9600),
            EventSink::new(AttemptId(1), tx),
        );
        assert!(matches!(result, Err(DetectError::OpenFailed { .. })));
    }
}
