//! Capability traits consumed by the primary sensor loop.
//!
//! A [`Sensor`] produces observations (camera frames, finger flags, speech
//! transcripts, ...) and a [`Classifier`] turns one observation into an
//! [`Action`].  The two are paired by their observation type so that the
//! gesture and voice modalities plug into the same loop.

use teleop_types::{Action, TeleopError};

/// A local input device.
pub trait Sensor: Send {
    /// What one acquisition yields.
    type Observation;

    /// Acquire one observation, blocking at most for the device's own
    /// frame interval.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Sensor`] for a failed acquisition (the caller
    /// skips the iteration) and [`TeleopError::SensorExhausted`] when the
    /// device will never produce another observation.
    fn acquire(&mut self) -> Result<Self::Observation, TeleopError>;
}

/// Maps an observation to a discrete [`Action`].
pub trait Classifier<O>: Send {
    /// Classify `observation`.
    ///
    /// Returns `None` when nothing was detected; callers treat that as
    /// [`Action::None`].
    fn classify(&mut self, observation: &O) -> Option<Action>;
}

impl<O, F> Classifier<O> for F
where
    F: FnMut(&O) -> Option<Action> + Send,
{
    fn classify(&mut self, observation: &O) -> Option<Action> {
        self(observation)
    }
}
