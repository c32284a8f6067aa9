//! Serial port enumeration
//!
//! Produces the serial-shaped candidates, as `(endpoint, label)` pairs, in
//! a stable order: well-known device nodes first (on platforms that have
//! them), then anything else the OS reports.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info, warn};

/// Source of serial-shaped endpoints
pub trait PortEnumerator {
    /// Ordered `(endpoint, label)` pairs; an empty list is valid
    fn available_ports(&self) -> Vec<(String, String)>;
}

impl<F> PortEnumerator for F
where
    F: Fn() -> Vec<(String, String)>,
{
    fn available_ports(&self) -> Vec<(String, String)> {
        self()
    }
}

/// Fixed list of ports, mostly useful for tests and pinned setups
#[derive(Debug, Clone, Default)]
pub struct StaticPorts(pub Vec<(String, String)>);

impl PortEnumerator for StaticPorts {
    fn available_ports(&self) -> Vec<(String, String)> {
        self.0.clone()
    }
}

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::bare(name),
        }
    }

    fn bare(name: String) -> Self {
        Self {
            port: name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Display label: the USB product string when known, else the port name
    pub fn label(&self) -> String {
        self.product.clone().unwrap_or_else(|| self.port.clone())
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these patterns
    pub skip_patterns: Vec<String>,
    /// Device node patterns probed before the OS port list; `{}` is
    /// replaced by `0..=9` and `{a}` by `a..=j`
    pub device_patterns: Vec<String>,
    /// Also include ports reported by the OS enumeration API
    pub use_os_enumeration: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            skip_patterns: Vec::new(),
            device_patterns: default_device_patterns(),
            use_os_enumeration: true,
        }
    }
}

fn default_device_patterns() -> Vec<String> {
    let patterns: &[&str] = if cfg!(target_os = "linux") {
        &["/dev/ttyS{}", "/dev/ttyUSB{}", "/dev/rfcomm{}", "/dev/ttyACM{}"]
    } else if cfg!(target_os = "freebsd") {
        &["/dev/cuaa{}", "/dev/ucom{}"]
    } else if cfg!(target_os = "solaris") {
        &["/dev/cua/{a}"]
    } else {
        &[]
    };
    patterns.iter().map(|p| p.to_string()).collect()
}

/// Serial port scanner backed by the filesystem and the `serialport` crate
pub struct SystemPortEnumerator {
    config: ScannerConfig,
}

impl SystemPortEnumerator {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate serial ports with whatever USB details are available
    pub fn enumerate_ports(&self) -> Vec<SerialPortInfo> {
        let mut result: Vec<SerialPortInfo> = self
            .probe_device_nodes(|p| p.exists())
            .into_iter()
            .map(SerialPortInfo::bare)
            .collect();

        if self.config.use_os_enumeration {
            match available_ports() {
                Ok(ports) => {
                    for p in ports {
                        let info = SerialPortInfo::from_serialport(p.port_name, &p.port_type);
                        // Prefer the richer OS description for nodes we already found
                        if let Some(existing) = result.iter_mut().find(|e| e.port == info.port) {
                            *existing = info;
                        } else {
                            result.push(info);
                        }
                    }
                }
                Err(e) => warn!("Failed to enumerate ports: {}", e),
            }
        }

        result.retain(|p| !self.should_skip_port(p));

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                debug!("  {} - {}", port.port, port.label());
            }
        }

        result
    }

    /// Expand the device patterns and keep the nodes `exists` accepts
    fn probe_device_nodes(&self, exists: impl Fn(&Path) -> bool) -> Vec<String> {
        self.config
            .device_patterns
            .iter()
            .flat_map(|pattern| expand_pattern(pattern))
            .filter(|node| exists(Path::new(node)))
            .collect()
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

/// Expand one device pattern into its ten candidate nodes
fn expand_pattern(pattern: &str) -> Vec<String> {
    if pattern.contains("{a}") {
        (b'a'..=b'j')
            .map(|c| pattern.replace("{a}", &char::from(c).to_string()))
            .collect()
    } else if pattern.contains("{}") {
        (0..10).map(|i| pattern.replace("{}", &i.to_string())).collect()
    } else {
        vec![pattern.to_string()]
    }
}

impl Default for SystemPortEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortEnumerator for SystemPortEnumerator {
    fn available_ports(&self) -> Vec<(String, String)> {
        self.enumerate_ports()
            .into_iter()
            .map(|p| {
                let label = p.label();
                (p.port, label)
            })
            .collect()
    }
}
