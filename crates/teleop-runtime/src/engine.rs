//! [`Engine`] – wires the background loops together and owns their threads.
//!
//! [`Engine::start`] spawns the arbiter, the inbound listener and (when a
//! secondary source is configured) the stream ingester, each on its own
//! named thread.  The caller keeps the foreground [`SensorLoop`] on its own
//! thread and calls [`EngineHandle::shutdown`] when it returns.
//!
//! [`SensorLoop`]: crate::sensor_loop::SensorLoop

use std::thread::{self, JoinHandle};

use teleop_hal::{CommandLink, DatagramSource, FrameSource, MjpegSource, UdpCommandLink, UdpReceiver};
use teleop_types::TeleopError;
use tracing::{Span, error, info, info_span};

use crate::arbiter::Arbiter;
use crate::config::EngineConfig;
use crate::ingester::StreamIngester;
use crate::listener::InboundListener;
use crate::shutdown::ShutdownToken;
use crate::store::SharedStore;

/// The capability providers the background loops drive.
pub struct EngineParts {
    pub link: Box<dyn CommandLink>,
    pub inbound: Box<dyn DatagramSource>,
    pub secondary: Option<Box<dyn FrameSource>>,
}

impl EngineParts {
    /// Production wiring: UDP both ways and an MJPEG source when a stream
    /// URL is configured.  The inbound port is bound here, once.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] when a socket cannot be bound and
    /// [`TeleopError::Configuration`] when the HTTP client cannot be built.
    pub fn udp(config: &EngineConfig) -> Result<Self, TeleopError> {
        let link = UdpCommandLink::new(config.peer)?;
        let inbound = UdpReceiver::bind(config.listen_port, config.recv_timeout)?;
        let secondary = match &config.stream_url {
            Some(url) => Some(Box::new(MjpegSource::new(
                url.clone(),
                config.stream_connect_timeout,
                config.stream_stall_timeout,
            )?) as Box<dyn FrameSource>),
            None => None,
        };
        Ok(Self {
            link: Box::new(link),
            inbound: Box::new(inbound),
            secondary,
        })
    }
}

pub struct Engine;

impl Engine {
    /// Validate `config` and spawn the background loops.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Configuration`] for an invalid config or when
    /// a thread cannot be spawned.  Already-spawned loops are stopped before
    /// returning.
    pub fn start(
        config: &EngineConfig,
        parts: EngineParts,
        store: SharedStore,
        shutdown: ShutdownToken,
    ) -> Result<EngineHandle, TeleopError> {
        config.validate()?;
        let mut handle = EngineHandle {
            shutdown: shutdown.clone(),
            threads: Vec::new(),
        };

        let arbiter = Arbiter::new(parts.link, store.clone(), config.escalate_after);
        let period = config.arbiter_period;
        let token = shutdown.clone();
        let span = info_span!("arbiter", peer = %config.peer, period_ms = period.as_millis() as u64);
        handle.spawn("arbiter", span, move || arbiter.run(period, &token))?;

        let listener = InboundListener::new(parts.inbound, store.clone());
        let token = shutdown.clone();
        let span = info_span!("inbound", listen_port = config.listen_port);
        handle.spawn("inbound", span, move || listener.run(&token))?;

        if let Some(source) = parts.secondary {
            let span = info_span!("ingester", stream = source.id());
            let ingester = StreamIngester::new(source, store, config.backoff, shutdown);
            handle.spawn("ingester", span, move || ingester.run())?;
        } else {
            info!("no secondary stream configured");
        }

        Ok(handle)
    }
}

/// Owns the background threads.  Dropping the handle without calling
/// [`EngineHandle::shutdown`] leaves the loops running until process exit.
pub struct EngineHandle {
    shutdown: ShutdownToken,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl EngineHandle {
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Names of the running background loops, in spawn order.
    pub fn loops(&self) -> Vec<&'static str> {
        self.threads.iter().map(|(name, _)| *name).collect()
    }

    /// Cancel every loop and join its thread.
    pub fn shutdown(self) {
        self.shutdown.cancel();
        for (name, thread) in self.threads {
            if thread.join().is_err() {
                error!(loop_name = name, "background loop panicked");
            }
        }
        info!("engine stopped");
    }

    fn spawn(
        &mut self,
        name: &'static str,
        span: Span,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<(), TeleopError> {
        let spawned = thread::Builder::new()
            .name(format!("teleop-{name}"))
            .spawn(move || {
                let _entered = span.entered();
                body();
            });
        match spawned {
            Ok(thread) => {
                self.threads.push((name, thread));
                Ok(())
            }
            Err(e) => {
                let running = std::mem::take(&mut self.threads);
                EngineHandle {
                    shutdown: self.shutdown.clone(),
                    threads: running,
                }
                .shutdown();
                Err(TeleopError::Configuration(format!(
                    "cannot spawn {name} thread: {e}"
                )))
            }
        }
    }
}
