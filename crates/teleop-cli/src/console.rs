//! Line-oriented console sensors.
//!
//! Without a camera or microphone attached, the operator (or a script piped
//! into stdin) supplies one observation per line:
//!
//! - gesture mode: five finger flags, e.g. `01100` or `0 1 1 0 0`;
//! - voice mode: one utterance of free text, e.g. `go left`.
//!
//! End of input ends the foreground loop.

use std::io::BufRead;

use teleop_hal::{FingerFlags, Sensor, Transcriber};
use teleop_types::TeleopError;

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, TeleopError> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => Err(TeleopError::SensorExhausted),
        Ok(_) => Ok(line.trim().to_string()),
        Err(e) => Err(TeleopError::Sensor(format!("read failed: {e}"))),
    }
}

/// Finger-flag observations, one per line.
pub struct FlagLines<R> {
    reader: R,
}

impl<R: BufRead + Send> FlagLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> Sensor for FlagLines<R> {
    type Observation = FingerFlags;

    fn acquire(&mut self) -> Result<FingerFlags, TeleopError> {
        let line = read_line(&mut self.reader)?;
        if line.is_empty() {
            return Err(TeleopError::Sensor("empty line".to_string()));
        }
        line.parse()
    }
}

/// Treats each line as an already-transcribed utterance.
pub struct TranscriptLines<R> {
    reader: R,
}

impl<R: BufRead + Send> TranscriptLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> Transcriber for TranscriptLines<R> {
    fn transcribe(&mut self) -> Result<String, TeleopError> {
        read_line(&mut self.reader)
    }
}
