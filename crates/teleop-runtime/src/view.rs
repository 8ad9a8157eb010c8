//! Read-only dashboard composition.
//!
//! The engine never draws anything itself.  It hands a [`DashboardView`],
//! assembled from snapshots of all three containers, to whatever
//! [`Renderer`] the entry point supplies.

use teleop_hal::RasterImage;
use teleop_types::{Action, Command, TeleopError};

use crate::ingester::IngestState;
use crate::store::SharedStore;

/// Placeholder shown for a field that has never been set.
pub const EMPTY_FIELD: &str = "—";

/// Banner shown instead of the secondary frame while it is unavailable.
pub const OFFLINE_BANNER: &str = "CAMERA OFFLINE";

/// Everything a renderer needs for one frame of the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub gesture: Action,
    pub active: Action,
    pub last_tx: Option<Command>,
    pub last_rx: Option<String>,
    pub tx_failures: u32,
    pub secondary: Option<RasterImage>,
    pub secondary_state: IngestState,
}

impl DashboardView {
    /// Snapshot the store.  Each container is copied under its own lock; the
    /// view is therefore consistent per container, not across containers.
    pub fn compose(store: &SharedStore) -> Self {
        let control = store.control_snapshot();
        let log = store.log_snapshot();
        let feed = store.secondary_snapshot();
        Self {
            gesture: control.observed_gesture(),
            active: control.active_command(),
            last_tx: log.last_tx,
            last_rx: log.last_rx,
            tx_failures: log.tx_failures,
            secondary: feed.image,
            secondary_state: feed.state,
        }
    }

    /// `"TX → F     RX ← ok"`, with placeholders for missing values.
    pub fn log_line(&self) -> String {
        let tx = self
            .last_tx
            .map_or_else(|| EMPTY_FIELD.to_string(), |c| c.to_string());
        let rx = self.last_rx.as_deref().unwrap_or(EMPTY_FIELD);
        format!("TX → {tx}     RX ← {rx}")
    }

    /// Frame dimensions, or [`OFFLINE_BANNER`] when no frame is available.
    pub fn secondary_banner(&self) -> String {
        match &self.secondary {
            Some(image) => format!("{}x{}", image.width, image.height),
            None => OFFLINE_BANNER.to_string(),
        }
    }
}

/// Whether the foreground loop should keep going after a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Output surface for the dashboard (window, terminal, web socket, ...).
pub trait Renderer: Send {
    /// Present `view`.  Return [`Flow::Exit`] when the operator asked to
    /// quit.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Render`] when the frame could not be shown;
    /// the loop logs it and carries on.
    fn render(&mut self, view: &DashboardView) -> Result<Flow, TeleopError>;
}
