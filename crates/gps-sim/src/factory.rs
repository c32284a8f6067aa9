//! Simulated connection factory

use gps_detect::{
    Connection, ConnectionFactory, DetectError, EventSink, NetworkEndpoint, SerialSettings,
    StaticPorts, PLATFORM_SOURCE,
};
use tracing::debug;

use crate::connection::SimConnection;
use crate::device::SimDevice;
use crate::stats::SimStats;

/// Factory whose endpoints follow scripted [`SimDevice`] behaviour
///
/// Endpoints without a registered device open and stay silent.
#[derive(Debug, Default)]
pub struct SimFactory {
    devices: Vec<(String, SimDevice)>,
    platform_supported: bool,
    stats: SimStats,
}

impl SimFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of `endpoint`
    ///
    /// Network endpoints are keyed by their full `host:port:extra` form.
    pub fn with_device(mut self, endpoint: impl Into<String>, device: SimDevice) -> Self {
        let endpoint = endpoint.into();
        self.devices.retain(|(e, _)| *e != endpoint);
        self.devices.push((endpoint, device));
        self
    }

    /// Pretend a platform location source is available
    pub fn with_platform(mut self, supported: bool) -> Self {
        self.platform_supported = supported;
        self
    }

    /// Counters shared with every connection this factory opens
    pub fn stats(&self) -> SimStats {
        self.stats.clone()
    }

    /// Registered serial endpoints, in registration order, as an enumerator
    pub fn ports(&self) -> StaticPorts {
        StaticPorts(
            self.devices
                .iter()
                .filter(|(endpoint, _)| !endpoint.contains(':') && endpoint != PLATFORM_SOURCE)
                .map(|(endpoint, _)| (endpoint.clone(), format!("simulated {}", endpoint)))
                .collect(),
        )
    }

    fn device(&self, endpoint: &str) -> SimDevice {
        self.devices
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, device)| device.clone())
            .unwrap_or_default()
    }

    fn open(&self, endpoint: &str, baud: Option<u32>, events: EventSink) -> SimConnection {
        let device = self.device(endpoint);
        debug!(
            "Simulated open of {} ({:?}) for attempt {}",
            endpoint,
            device,
            events.attempt()
        );
        SimConnection::open(
            endpoint,
            baud,
            device.script(baud),
            self.stats.clone(),
            events,
        )
    }
}

impl ConnectionFactory for SimFactory {
    fn supports_platform(&self) -> bool {
        self.platform_supported
    }

    fn open_network(&mut self, endpoint: &NetworkEndpoint, events: EventSink) -> Box<dyn Connection> {
        Box::new(self.open(&endpoint.to_string(), None, events))
    }

    fn open_platform(&mut self, events: EventSink) -> Option<Box<dyn Connection>> {
        if !self.platform_supported {
            return None;
        }
        Some(Box::new(self.open(PLATFORM_SOURCE, None, events)))
    }

    fn open_serial(
        &mut self,
        path: &str,
        settings: SerialSettings,
        events: EventSink,
    ) -> Result<Box<dyn Connection>, DetectError> {
        let baud = Some(settings.baud_rate);
        if self.device(path).is_busy() {
            self.stats.record_refused(path, baud);
            return Err(DetectError::PortBusy(path.to_string()));
        }
        Ok(Box::new(self.open(path, baud, events)))
    }
}
