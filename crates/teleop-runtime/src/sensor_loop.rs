//! [`SensorLoop`] – the foreground pipeline.
//!
//! Per iteration: acquire one observation, classify it, publish the
//! gesture/command pair, and optionally render a [`DashboardView`].  A failed
//! acquisition skips the iteration without touching shared state.  This loop
//! is the only writer of the control container.

use teleop_hal::{Classifier, Sensor};
use teleop_types::{Action, TeleopError};
use tracing::{debug, info, warn};

use crate::shutdown::ShutdownToken;
use crate::store::SharedStore;
use crate::view::{DashboardView, Flow, Renderer};

pub struct SensorLoop<S, C> {
    sensor: S,
    classifier: C,
    store: SharedStore,
    renderer: Option<Box<dyn Renderer>>,
    last_gesture: Option<Action>,
}

impl<S, C> SensorLoop<S, C>
where
    S: Sensor,
    C: Classifier<S::Observation>,
{
    pub fn new(sensor: S, classifier: C, store: SharedStore) -> Self {
        Self {
            sensor,
            classifier,
            store,
            renderer: None,
            last_gesture: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Run one iteration.
    ///
    /// # Errors
    ///
    /// Only non-transient sensor errors (e.g.
    /// [`TeleopError::SensorExhausted`]) are returned; everything else is
    /// absorbed.
    pub fn step(&mut self) -> Result<Flow, TeleopError> {
        let observation = match self.sensor.acquire() {
            Ok(observation) => observation,
            Err(e) if e.is_transient() => {
                debug!(error = %e, "sensor acquisition failed; skipping");
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e),
        };

        let gesture = self
            .classifier
            .classify(&observation)
            .unwrap_or(Action::None);
        self.store.publish_gesture(gesture);
        if self.last_gesture != Some(gesture) {
            debug!(%gesture, active = %gesture.or_stop(), "gesture changed");
            self.last_gesture = Some(gesture);
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(Flow::Continue);
        };
        let view = DashboardView::compose(&self.store);
        match renderer.render(&view) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                warn!(error = %e, "render failed");
                Ok(Flow::Continue)
            }
        }
    }

    /// Iterate until the sensor is exhausted, the renderer asks to exit or
    /// `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Propagates non-transient errors other than sensor exhaustion.
    pub fn run(mut self, shutdown: &ShutdownToken) -> Result<(), TeleopError> {
        info!("sensor loop started");
        while !shutdown.is_cancelled() {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    info!("exit requested by renderer");
                    break;
                }
                Err(TeleopError::SensorExhausted) => {
                    info!("sensor exhausted");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        info!("sensor loop stopped");
        Ok(())
    }
}
