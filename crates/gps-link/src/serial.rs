//! Serial port NMEA links

use std::time::Duration;

use gps_detect::{EventSink, SerialSettings};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::error::LinkError;
use crate::link::{spawn_stream_link, NmeaConnection};

/// Open `path` with the given frame format
///
/// On unix the port is locked exclusively while open.
pub fn open_stream(path: &str, settings: SerialSettings) -> Result<SerialStream, LinkError> {
    let serial_error = |e: tokio_serial::Error| LinkError::Serial {
        port: path.to_string(),
        reason: e.to_string(),
    };

    #[allow(unused_mut)]
    let mut stream = tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(settings.flow_control)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(serial_error)?;

    #[cfg(unix)]
    stream.set_exclusive(true).map_err(serial_error)?;

    Ok(stream)
}

/// Open a serial port and start reading NMEA from it
///
/// Closing the returned connection closes the port before `close` returns,
/// so the same port can be reopened straight away at another baud rate.
pub fn open_serial_link(
    path: &str,
    settings: SerialSettings,
    events: EventSink,
) -> Result<NmeaConnection, LinkError> {
    let stream = open_stream(path, settings)?;
    debug!("Opened {} at {} baud", path, settings.baud_rate);
    Ok(spawn_stream_link(
        format!("{} @ {}", path, settings.baud_rate),
        stream,
        events,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_port_reports_path() {
        match open_stream("/dev/does-not-exist-gps", SerialSettings::new(4800)) {
            Err(LinkError::Serial { port, .. }) => assert_eq!(port, "/dev/does-not-exist-gps"),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
