//! Raster frames and the secondary video source traits.
//!
//! A [`FrameSource`] is something that can be *opened* (an HTTP stream, a
//! device), yielding a [`FrameStream`] that is pulled frame by frame until
//! it fails.  Dropping the stream releases the underlying handle.

use teleop_types::TeleopError;

/// Pixel layout of a [`RasterImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, `width * height * 3` bytes.
    Rgb24,
    /// A complete JPEG bitstream, undecoded.
    Jpeg,
}

/// A single image frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Frame width in pixels (`0` when unknown).
    pub width: u32,
    /// Frame height in pixels (`0` when unknown).
    pub height: u32,
    pub format: PixelFormat,
    /// Raw pixel or bitstream bytes.
    pub data: Vec<u8>,
}

impl RasterImage {
    /// A black RGB24 frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgb24,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    /// Wrap a JPEG bitstream, reading its dimensions from the SOF header.
    pub fn from_jpeg(data: Vec<u8>) -> Self {
        let (width, height) = jpeg_dimensions(&data).unwrap_or((0, 0));
        Self {
            width,
            height,
            format: PixelFormat::Jpeg,
            data,
        }
    }
}

/// A remote or local video source that can be (re)opened.
pub trait FrameSource: Send {
    /// Stable identifier for logs, e.g. the stream URL.
    fn id(&self) -> &str;

    /// Open a fresh stream.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::StreamUnavailable`] when the source cannot be
    /// reached.
    fn open(&mut self) -> Result<Box<dyn FrameStream>, TeleopError>;
}

/// An open stream of frames.
pub trait FrameStream: Send {
    /// Pull the next frame, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::StreamEnded`] when the stream is exhausted or
    /// a read fails; the stream should then be dropped.
    fn next_frame(&mut self) -> Result<RasterImage, TeleopError>;
}

/// Read `(width, height)` from the first start-of-frame segment of a JPEG.
pub fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut i = 2;
    while i + 3 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        // Fill bytes and standalone markers carry no length field.
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if matches!(marker, 0x01 | 0xD0..=0xD7) {
            i += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if i + 8 >= data.len() {
                return None;
            }
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return Some((u32::from(width), u32::from(height)));
        }
        i += 2 + seg_len;
    }
    None
}
