//! [`StreamIngester`] – self-healing view of a remote video source.
//!
//! ```text
//!            open ok                    read error
//! Connecting ───────▶ Streaming ─────────────────▶ Reconnecting
//!   ▲   │ open error      │ frame ok                    │
//!   │   └─(backoff)─┐     └──(publish, stay)            │ (backoff)
//!   └───────────────┴───────────────────────────────────┘
//! ```
//!
//! The published frame is cleared whenever the ingester is not streaming,
//! so consumers see `None` exactly while the source is unavailable.

use std::fmt;
use std::time::Duration;

use teleop_hal::{FrameSource, FrameStream, RasterImage};
use tracing::{debug, info};

use crate::shutdown::ShutdownToken;
use crate::store::{SecondaryFeed, SharedStore};

/// Connection state of the secondary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestState {
    #[default]
    Connecting,
    Streaming,
    Reconnecting,
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IngestState::Connecting => "connecting",
            IngestState::Streaming => "streaming",
            IngestState::Reconnecting => "reconnecting",
        })
    }
}

/// Backoff intervals between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestBackoff {
    /// Wait after a failed open.
    pub connect: Duration,
    /// Wait after a stream drops, before reopening.
    pub reconnect: Duration,
}

impl Default for IngestBackoff {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            reconnect: Duration::from_secs(1),
        }
    }
}

/// Next state, the frame to publish with it, and how long to back off
/// afterwards.
type Outcome = (IngestState, Option<RasterImage>, Option<Duration>);

pub struct StreamIngester {
    source: Box<dyn FrameSource>,
    stream: Option<Box<dyn FrameStream>>,
    state: IngestState,
    store: SharedStore,
    backoff: IngestBackoff,
    shutdown: ShutdownToken,
}

impl StreamIngester {
    pub fn new(
        source: Box<dyn FrameSource>,
        store: SharedStore,
        backoff: IngestBackoff,
        shutdown: ShutdownToken,
    ) -> Self {
        store.secondary.set(SecondaryFeed::default());
        Self {
            source,
            stream: None,
            state: IngestState::Connecting,
            store,
            backoff,
            shutdown,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Advance the state machine by one action (one open attempt, one frame
    /// read or one backoff) and return the resulting state.
    ///
    /// The new state and the frame that goes with it are published in one
    /// critical section: a snapshot never pairs a frame with a non-streaming
    /// state.
    pub fn step(&mut self) -> IngestState {
        let (next, frame, backoff) = match self.state {
            IngestState::Connecting => self.connect(),
            IngestState::Streaming => self.read_frame(),
            IngestState::Reconnecting => (IngestState::Connecting, None, Some(self.backoff.reconnect)),
        };
        if next != self.state {
            info!(source = %self.source.id(), from = %self.state, to = %next, "secondary stream state");
            self.state = next;
        }
        self.store.secondary.update(|feed| {
            feed.state = next;
            feed.image = frame;
        });
        if let Some(wait) = backoff {
            self.shutdown.wait_timeout(wait);
        }
        next
    }

    pub fn run(mut self) {
        info!(source = %self.source.id(), "stream ingester started");
        while !self.shutdown.is_cancelled() {
            self.step();
        }
        self.stream = None;
        self.store.secondary.set(SecondaryFeed::default());
        info!("stream ingester stopped");
    }

    fn connect(&mut self) -> Outcome {
        match self.source.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                (IngestState::Streaming, None, None)
            }
            Err(e) => {
                debug!(error = %e, "secondary stream unavailable");
                (IngestState::Connecting, None, Some(self.backoff.connect))
            }
        }
    }

    fn read_frame(&mut self) -> Outcome {
        let Some(stream) = self.stream.as_mut() else {
            return (IngestState::Reconnecting, None, None);
        };
        match stream.next_frame() {
            Ok(image) => (IngestState::Streaming, Some(image), None),
            Err(e) => {
                debug!(error = %e, "secondary stream dropped");
                // Dropping the stream releases the connection.
                self.stream = None;
                (IngestState::Reconnecting, None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::thread;
    use teleop_types::TeleopError;

    /// Each open pops one script entry: `None` fails the open, `Some(n)`
    /// yields a stream of `n` frames (`u32::MAX` ≈ endless).
    struct ScriptedSource(VecDeque<Option<u32>>);

    struct CountdownStream(u32);

    impl FrameStream for CountdownStream {
        fn next_frame(&mut self) -> Result<RasterImage, TeleopError> {
            if self.0 == 0 {
                return Err(TeleopError::StreamEnded("camera rebooted".to_string()));
            }
            self.0 -= 1;
            Ok(RasterImage::blank(2, 2))
        }
    }

    impl FrameSource for ScriptedSource {
        fn id(&self) -> &str {
            "scripted://cam"
        }

        fn open(&mut self) -> Result<Box<dyn FrameStream>, TeleopError> {
            match self.0.pop_front().flatten() {
                Some(frames) => Ok(Box::new(CountdownStream(frames))),
                None => Err(TeleopError::StreamUnavailable {
                    url: "scripted://cam".to_string(),
                    details: "connection refused".to_string(),
                }),
            }
        }
    }

    fn no_backoff() -> IngestBackoff {
        IngestBackoff {
            connect: Duration::ZERO,
            reconnect: Duration::ZERO,
        }
    }

    #[test]
    fn state_machine_heals_after_failures() {
        let store = SharedStore::new();
        let source = ScriptedSource(VecDeque::from([None, Some(1), Some(u32::MAX)]));
        let mut ingester =
            StreamIngester::new(Box::new(source), store.clone(), no_backoff(), ShutdownToken::new());
        let image = || store.secondary_snapshot().image;

        // Open fails: stay in Connecting with no frame.
        assert_eq!(ingester.step(), IngestState::Connecting);
        assert!(image().is_none());

        // Open succeeds; no frame until the first read.
        assert_eq!(ingester.step(), IngestState::Streaming);
        assert!(image().is_none());
        assert_eq!(ingester.step(), IngestState::Streaming);
        assert!(image().is_some());

        // Read fails: frame cleared immediately.
        assert_eq!(ingester.step(), IngestState::Reconnecting);
        assert!(image().is_none());
        assert_eq!(store.secondary_snapshot().state, IngestState::Reconnecting);

        assert_eq!(ingester.step(), IngestState::Connecting);
        assert!(image().is_none());

        assert_eq!(ingester.step(), IngestState::Streaming);
        assert_eq!(ingester.step(), IngestState::Streaming);
        assert_eq!(image(), Some(RasterImage::blank(2, 2)));
        assert_eq!(store.secondary_snapshot().state, IngestState::Streaming);
    }

    #[test]
    fn unreachable_source_keeps_retrying() {
        let store = SharedStore::new();
        let source = ScriptedSource(VecDeque::new());
        let mut ingester =
            StreamIngester::new(Box::new(source), store.clone(), no_backoff(), ShutdownToken::new());
        for _ in 0..5 {
            assert_eq!(ingester.step(), IngestState::Connecting);
        }
        assert!(store.secondary_snapshot().image.is_none());
    }

    #[test]
    fn run_stops_on_shutdown_during_backoff() {
        let store = SharedStore::new();
        let shutdown = ShutdownToken::new();
        let backoff = IngestBackoff {
            connect: Duration::from_secs(60),
            reconnect: Duration::from_secs(60),
        };
        let ingester = StreamIngester::new(
            Box::new(ScriptedSource(VecDeque::new())),
            store.clone(),
            backoff,
            shutdown.clone(),
        );
        let handle = thread::spawn(move || ingester.run());
        thread::sleep(Duration::from_millis(20));
        shutdown.cancel();
        handle.join().unwrap();
        assert_eq!(store.secondary_snapshot(), SecondaryFeed::default());
    }

    #[test]
    fn frame_is_never_published_with_a_non_streaming_state() {
        let store = SharedStore::new();
        let shutdown = ShutdownToken::new();
        // Every stream yields one frame and then drops.
        let source = ScriptedSource(std::iter::repeat_n(Some(1), 5_000).collect());
        let ingester = StreamIngester::new(Box::new(source), store.clone(), no_backoff(), shutdown.clone());
        let handle = thread::spawn(move || ingester.run());

        let mut saw_frame = false;
        for _ in 0..20_000 {
            let feed = store.secondary_snapshot();
            if feed.image.is_some() {
                saw_frame = true;
                assert_eq!(feed.state, IngestState::Streaming);
            }
        }
        shutdown.cancel();
        handle.join().unwrap();
        assert!(saw_frame);
    }

    /// Minimal MJPEG camera on loopback.  The first connection gets one
    /// frame; every connection then goes silent with the socket left open.
    fn silent_camera() -> String {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let mut held = Vec::new();
            for (n, conn) in listener.incoming().enumerate() {
                let Ok(mut conn) = conn else { break };
                let mut request = BufReader::new(conn.try_clone().unwrap());
                let mut line = String::new();
                while request.read_line(&mut line).is_ok_and(|len| len > 2) {
                    line.clear();
                }
                let mut response = b"HTTP/1.1 200 OK\r\n\
                    Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\r\n"
                    .to_vec();
                if n == 0 {
                    response.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
                    response.extend_from_slice(&JPEG);
                    response.extend_from_slice(b"\r\n");
                }
                let _ = conn.write_all(&response);
                let _ = conn.flush();
                held.push(conn);
            }
        });
        format!("http://{addr}/stream")
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn stalled_camera_is_reported_unavailable_and_shutdown_completes() {
        let source = teleop_hal::MjpegSource::new(
            silent_camera(),
            Duration::from_secs(1),
            Duration::from_millis(200),
        )
        .unwrap();
        let store = SharedStore::new();
        let shutdown = ShutdownToken::new();
        let backoff = IngestBackoff {
            connect: Duration::from_millis(20),
            reconnect: Duration::from_millis(20),
        };
        let ingester = StreamIngester::new(Box::new(source), store.clone(), backoff, shutdown.clone());
        let handle = thread::spawn(move || ingester.run());

        assert!(wait_for(|| store.secondary_snapshot().image.is_some()), "first frame");
        assert!(
            wait_for(|| store.secondary_snapshot().image.is_none()),
            "frozen frame still shown after the camera went silent"
        );

        shutdown.cancel();
        assert!(wait_for(|| handle.is_finished()), "ingester blocked after shutdown");
        handle.join().unwrap();
        assert_eq!(store.secondary_snapshot(), SecondaryFeed::default());
    }
}
