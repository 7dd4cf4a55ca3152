//! Sample decoding
//!
//! Turns one comma-delimited trace line (`timestamp,current,pin_state[,...]`)
//! into a [`DecodedSample`]. Negative currents are clamped to zero and the pin
//! string is split into health, main, modem and phase fields according to the
//! configured [`PinLayout`].

use crate::config::PinLayout;
use crate::error::ProfileError;
use crate::types::{DecodedSample, Health, RawSample};
use std::io::{self, BufRead};

/// Fields every record must carry: timestamp, current, pin state
pub const MIN_RECORD_FIELDS: usize = 3;

/// Decoder for raw trace records
#[derive(Debug, Clone, Default)]
pub struct SampleDecoder {
    layout: PinLayout,
}

impl SampleDecoder {
    pub fn new(layout: PinLayout) -> Self {
        Self { layout }
    }

    /// Split a line into its raw fields. Trailing fields are ignored.
    pub fn parse_raw(line: &str, line_no: usize) -> Result<RawSample, ProfileError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < MIN_RECORD_FIELDS {
            return Err(malformed(
                line_no,
                format!(
                    "expected at least {MIN_RECORD_FIELDS} fields, found {}",
                    fields.len()
                ),
            ));
        }

        let timestamp = parse_float(fields[0], "timestamp", line_no)?;
        let current = parse_float(fields[1], "current", line_no)?;

        Ok(RawSample {
            timestamp,
            current,
            pin_state: fields[2].to_string(),
        })
    }

    /// Decode an already split record
    pub fn decode(&self, raw: RawSample, line_no: usize) -> Result<DecodedSample, ProfileError> {
        let pins = raw.pin_state.as_str();

        if !pins.chars().all(|c| c == '0' || c == '1') {
            return Err(malformed(
                line_no,
                format!("pin state {pins:?} contains characters other than 0/1"),
            ));
        }

        let min_width = self.layout.min_width();
        if pins.len() < min_width {
            return Err(malformed(
                line_no,
                format!(
                    "pin state {pins:?} is {} bits wide, need at least {min_width}",
                    pins.len()
                ),
            ));
        }

        // Pins are ASCII from here on, so byte slicing is safe
        let health_code = &pins[self.layout.health_start..self.layout.health_end];
        let health = if health_code == self.layout.running_code {
            Health::Running
        } else if health_code == self.layout.finished_code {
            Health::Finished
        } else {
            Health::Other
        };

        let bytes = pins.as_bytes();
        let phase_end = self.layout.phase_end.min(pins.len());

        Ok(DecodedSample {
            timestamp: raw.timestamp,
            current: clamp_current(raw.current),
            health,
            main_active: bytes[self.layout.main_pin] == b'1',
            modem_active: bytes[self.layout.modem_pin] == b'1',
            phase_bits: pins[self.layout.phase_start..phase_end].to_string(),
        })
    }

    /// Parse and decode one line
    pub fn decode_line(&self, line: &str, line_no: usize) -> Result<DecodedSample, ProfileError> {
        let raw = Self::parse_raw(line, line_no)?;
        self.decode(raw, line_no)
    }
}

/// Numbered lines of a trace, read as raw bytes.
///
/// A line that is not valid UTF-8 comes back as a [`ProfileError::MalformedRecord`]
/// so the caller can skip it; only a failing read ends the stream with an error.
pub fn trace_lines<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = io::Result<(usize, Result<String, ProfileError>)>> {
    reader.split(b'\n').enumerate().map(|(index, bytes)| {
        let line_no = index + 1;
        let mut bytes = bytes?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = String::from_utf8(bytes)
            .map_err(|e| malformed(line_no, format!("line is not valid UTF-8: {e}")));
        Ok((line_no, line))
    })
}

/// Negative readings are below the sensor noise floor
pub fn clamp_current(current: f64) -> f64 {
    if current > 0.0 {
        current
    } else {
        0.0
    }
}

fn parse_float(field: &str, name: &str, line_no: usize) -> Result<f64, ProfileError> {
    let value: f64 = field
        .parse()
        .map_err(|_| malformed(line_no, format!("{name} {field:?} is not a number")))?;
    if !value.is_finite() {
        return Err(malformed(line_no, format!("{name} {field:?} is not finite")));
    }
    Ok(value)
}

fn malformed(line: usize, reason: String) -> ProfileError {
    ProfileError::MalformedRecord { line, reason }
}
