//! `teleop-hal` – hardware and network edge of the teleoperation stack.
//!
//! Everything the engine consumes from the outside world sits behind a trait
//! here, with one production driver per trait:
//!
//! - [`transport`] – [`CommandLink`] / [`DatagramSource`] with UDP drivers.
//! - [`camera`] – [`RasterImage`] and the [`FrameSource`] / [`FrameStream`]
//!   pair used by the secondary video ingester.
//! - [`mjpeg`] – [`MjpegSource`], an MJPEG-over-HTTP frame source.
//! - [`sensor`] – the [`Sensor`] and [`Classifier`] capability traits.
//! - [`gesture`] – hand landmarks → finger flags → [`Action`][teleop_types::Action].
//! - [`voice`] – speech transcript → [`Action`][teleop_types::Action].

pub mod camera;
pub mod gesture;
pub mod mjpeg;
pub mod sensor;
pub mod transport;
pub mod voice;

pub use camera::{FrameSource, FrameStream, PixelFormat, RasterImage};
pub use gesture::{FingerFlags, FlagsClassifier, HandLandmarks, LandmarkClassifier, LandmarkDetector};
pub use mjpeg::MjpegSource;
pub use sensor::{Classifier, Sensor};
pub use transport::{CommandLink, DatagramSource, MAX_INBOUND_DATAGRAM, UdpCommandLink, UdpReceiver};
pub use voice::{TranscriptSensor, Transcriber, VoiceClassifier};
