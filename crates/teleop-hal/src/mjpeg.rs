//! MJPEG-over-HTTP [`FrameSource`].
//!
//! Network cameras commonly serve `multipart/x-mixed-replace` streams where
//! each part is a JPEG.  Rather than parsing multipart boundaries, the reader
//! scans the body for JPEG start/end-of-image markers, which works for every
//! boundary layout seen in the wild.

use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use teleop_types::TeleopError;
use tracing::debug;

use crate::camera::{FrameSource, FrameStream, RasterImage};

/// Upper bound on a single JPEG frame.  Larger frames are treated as a
/// corrupt stream.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Frame source backed by a blocking HTTP client.
pub struct MjpegSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl MjpegSource {
    /// Build a source for `url`.  `connect_timeout` bounds each open attempt.
    /// `stall_timeout` bounds every wait on the camera: the response headers
    /// and each body read.  A camera that keeps its connection open but stops
    /// sending therefore ends the stream instead of freezing it, while a
    /// healthy stream of any length is never cut off.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        stall_timeout: Duration,
    ) -> Result<Self, TeleopError> {
        // The blocking client applies `timeout` per wait, not per request.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(stall_timeout)
            .build()
            .map_err(|e| TeleopError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl FrameSource for MjpegSource {
    fn id(&self) -> &str {
        &self.url
    }

    fn open(&mut self) -> Result<Box<dyn FrameStream>, TeleopError> {
        let unavailable = |details: String| TeleopError::StreamUnavailable {
            url: self.url.clone(),
            details,
        };
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("http status {}", response.status())));
        }
        debug!(url = %self.url, "mjpeg stream opened");
        Ok(Box::new(JpegStream::new(response)))
    }
}

/// Splits an arbitrary byte stream into JPEG frames.
pub struct JpegStream<R> {
    reader: BufReader<R>,
}

impl<R: Read> JpegStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_BYTES, inner),
        }
    }
}

impl<R: Read + Send> FrameStream for JpegStream<R> {
    fn next_frame(&mut self) -> Result<RasterImage, TeleopError> {
        read_jpeg(&mut self.reader, MAX_FRAME_BYTES).map(RasterImage::from_jpeg)
    }
}

/// Read bytes until one complete `FFD8 .. FFD9` JPEG has been collected.
fn read_jpeg<R: BufRead>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, TeleopError> {
    let mut frame = Vec::new();
    let mut in_frame = false;
    let mut prev = 0u8;
    loop {
        let buf = reader
            .fill_buf()
            .map_err(|e| TeleopError::StreamEnded(e.to_string()))?;
        if buf.is_empty() {
            return Err(TeleopError::StreamEnded("end of stream".to_string()));
        }

        let mut consumed = 0;
        let mut complete = false;
        for &byte in buf {
            consumed += 1;
            if in_frame {
                frame.push(byte);
                if prev == 0xFF && byte == 0xD9 {
                    complete = true;
                    break;
                }
            } else if prev == 0xFF && byte == 0xD8 {
                in_frame = true;
                frame.extend_from_slice(&[0xFF, 0xD8]);
            }
            prev = byte;
        }
        reader.consume(consumed);

        if complete {
            return Ok(frame);
        }
        if frame.len() > max_len {
            return Err(TeleopError::StreamEnded(format!(
                "frame exceeds {max_len} bytes"
            )));
        }
    }
}
