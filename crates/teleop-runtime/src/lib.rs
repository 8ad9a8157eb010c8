//! `teleop-runtime` – the state-fusion and command-arbitration engine.
//!
//! One foreground loop and up to three background loops share state through
//! independently locked containers:
//!
//! - [`store`] – [`SharedStore`][store::SharedStore]: the control, link-log
//!   and secondary-frame containers, each read only through snapshot copies.
//! - [`arbiter`] – [`Arbiter`][arbiter::Arbiter]: polls the active command
//!   every period and transmits it only when it changed since the last
//!   successful send.
//! - [`listener`] – [`InboundListener`][listener::InboundListener]: drains
//!   inbound datagrams into the link log; never fails.
//! - [`ingester`] – [`StreamIngester`][ingester::StreamIngester]: keeps a
//!   self-healing connection to the secondary video source.
//! - [`sensor_loop`] – [`SensorLoop`][sensor_loop::SensorLoop]: the
//!   foreground acquire → classify → publish → render pipeline.
//! - [`view`] – [`DashboardView`][view::DashboardView] and the
//!   [`Renderer`][view::Renderer] trait.
//! - [`engine`] – [`Engine`][engine::Engine]: spawns the background loops
//!   and joins them on shutdown.
//! - [`shutdown`] – [`ShutdownToken`][shutdown::ShutdownToken]: cooperative
//!   cancellation checked at every loop head and sleep.
//! - [`config`] – [`EngineConfig`][config::EngineConfig].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console and
//!   optional OTLP span export.

pub mod arbiter;
pub mod config;
pub mod engine;
pub mod ingester;
pub mod listener;
pub mod sensor_loop;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod view;

pub use arbiter::Arbiter;
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle, EngineParts};
pub use ingester::{IngestBackoff, IngestState, StreamIngester};
pub use listener::InboundListener;
pub use sensor_loop::SensorLoop;
pub use shutdown::ShutdownToken;
pub use store::{ControlState, LinkLog, SecondaryFeed, SharedStore, StateCell};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use view::{DashboardView, Flow, Renderer};
