//! gpsd client links
//!
//! gpsd is asked to relay raw NMEA, which then goes through the same codec
//! as a serial port. The link keeps reconnecting on its own while it is
//! open, so it never reports a teardown of its own.

use std::time::Duration;

use gps_detect::{ConnectionStatus, EventSink, NetworkEndpoint};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::link::{LinkTask, LinkTaskCommand, NmeaConnection, ReadEnd};
use crate::shared_io::SharedIo;

/// Delay between connection attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Watch request enabling NMEA relay, optionally for a single device
pub fn watch_command(device: &str) -> String {
    let mut watch = json!({ "enable": true, "nmea": true });
    if !device.is_empty() {
        watch["device"] = json!(device);
    }
    format!("?WATCH={}\n", watch)
}

/// Start a gpsd link; the connection attempt runs in the background
pub fn connect_gpsd(endpoint: &NetworkEndpoint, events: EventSink) -> NmeaConnection {
    let (connection, task) = NmeaConnection::pair(
        format!("gpsd {}", endpoint.socket_addr()),
        ConnectionStatus::NotConnected,
        events,
    );
    let handle = tokio::spawn(run_gpsd(
        task,
        endpoint.socket_addr(),
        watch_command(&endpoint.extra),
    ));
    connection.with_task(handle)
}

async fn run_gpsd(mut task: LinkTask, addr: String, command: String) {
    loop {
        let result = tokio::select! {
            cmd = task.cmd_rx.recv() => {
                match cmd {
                    Some(LinkTaskCommand::Shutdown) | None => break,
                }
            }
            result = TcpStream::connect(addr.as_str()) => result,
        };

        match result {
            Ok(mut stream) => {
                info!("Connected to gpsd at {}", addr);
                task.state.connected();
                match stream.write_all(command.as_bytes()).await {
                    Ok(()) => {
                        let io = SharedIo::new(stream);
                        if task.state.read_loop(&io, &mut task.cmd_rx).await == ReadEnd::Closed {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to send watch request to {}: {}", addr, e),
                }
                task.state.reset();
            }
            Err(e) => debug!("gpsd at {} unreachable: {}", addr, e),
        }

        tokio::select! {
            cmd = task.cmd_rx.recv() => {
                match cmd {
                    Some(LinkTaskCommand::Shutdown) | None => break,
                }
            }
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
    debug!("Link to {} stopped", task.state.source());
}
