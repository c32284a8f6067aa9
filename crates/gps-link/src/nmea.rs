//! NMEA 0183 sentence framing
//!
//! Sentences are CR/LF terminated lines of the form
//! `$GPGGA,...*hh`. Only the frame is checked here (start marker, address
//! field, printable body, checksum when present); field contents are left
//! to whoever consumes the sentences.

use std::fmt;

use crate::error::ParseError;

/// Longest accepted sentence, excluding the line terminator
///
/// The standard limit is 82 characters; proprietary sentences run longer.
pub const MAX_SENTENCE_LEN: usize = 256;

/// A framed, checksum-valid NMEA sentence (without line terminator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence(String);

impl Sentence {
    /// Validate a single line and wrap it
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.len() > MAX_SENTENCE_LEN {
            return Err(ParseError::TooLong(line.len()));
        }
        let body = line
            .strip_prefix('$')
            .or_else(|| line.strip_prefix('!'))
            .ok_or(ParseError::MissingStartMarker)?;

        if let Some(b) = body.bytes().find(|b| !(0x20..0x7F).contains(b)) {
            return Err(ParseError::NonPrintable(b));
        }

        let (payload, checksum) = match body.split_once('*') {
            Some((payload, checksum)) => (payload, Some(checksum)),
            None => (body, None),
        };

        let address = payload.split(',').next().unwrap_or_default();
        if address.len() < 3 || !address.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidAddress(address.to_string()));
        }

        if let Some(checksum) = checksum {
            let expected = parse_checksum(checksum)?;
            let actual = checksum_of(payload);
            if expected != actual {
                return Err(ParseError::ChecksumMismatch { expected, actual });
            }
        }

        Ok(Self(line.to_string()))
    }

    /// Sentence text including the start marker
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address field, e.g. `GPGGA`
    pub fn address(&self) -> &str {
        self.0[1..].split([',', '*']).next().unwrap_or_default()
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// XOR of all bytes between the start marker and `*`
pub fn checksum_of(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

fn parse_checksum(field: &str) -> Result<u8, ParseError> {
    if field.len() != 2 {
        return Err(ParseError::InvalidChecksum(field.to_string()));
    }
    u8::from_str_radix(field, 16).map_err(|_| ParseError::InvalidChecksum(field.to_string()))
}

/// Streaming line codec producing validated sentences
#[derive(Debug, Default)]
pub struct NmeaCodec {
    buffer: Vec<u8>,
}

impl NmeaCodec {
    /// Create a new NMEA codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_SENTENCE_LEN),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // A line this long without a terminator is noise (wrong baud rate)
        if self.buffer.len() > MAX_SENTENCE_LEN * 4 && !self.buffer.contains(&b'\n') {
            let start = self.buffer.len() - MAX_SENTENCE_LEN;
            self.buffer.drain(..start);
        }
    }

    /// Extract the next complete line, validated
    ///
    /// Blank lines are skipped. Returns `None` when no complete line is
    /// buffered.
    pub fn next_sentence(&mut self) -> Option<Result<Sentence, ParseError>> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| b == b'\n')?;
            let line: Vec<u8> = self.buffer.drain(..=term_pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Some(Sentence::parse(line));
        }
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
