//! Error types for NMEA parsing and link setup

use thiserror::Error;

/// Errors that can occur while parsing an NMEA sentence
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not start with `$` or `!`
    #[error("missing start marker")]
    MissingStartMarker,

    /// Address field is missing or not alphanumeric
    #[error("invalid address field: {0:?}")]
    InvalidAddress(String),

    /// Non-printable or non-ASCII byte in the sentence
    #[error("non-printable byte 0x{0:02X}")]
    NonPrintable(u8),

    /// Checksum field is not two hex digits
    #[error("invalid checksum field: {0:?}")]
    InvalidChecksum(String),

    /// Line longer than the sentence limit
    #[error("sentence too long: {0} bytes")]
    TooLong(usize),

    /// Checksum mismatch
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Errors that can occur while opening a link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial port could not be opened or configured
    #[error("serial port {port}: {reason}")]
    Serial { port: String, reason: String },
}

impl From<LinkError> for gps_detect::DetectError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Serial { port, reason } => Self::OpenFailed { port, reason },
        }
    }
}
