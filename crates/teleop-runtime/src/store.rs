//! Shared state store.
//!
//! Three independent containers, each behind its own lock:
//!
//! | Container | Writer(s) | Contents |
//! |---|---|---|
//! | [`ControlState`] | primary sensor loop | observed gesture + active command |
//! | [`LinkLog`] | arbiter (`last_tx`), inbound listener (`last_rx`) | last message text each way |
//! | [`SecondaryFeed`] | secondary stream ingester | latest frame + ingest state |
//!
//! Every read is a snapshot copy taken under the lock; no reference to a
//! container's interior ever escapes a critical section, and callers never
//! perform I/O while a lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use teleop_hal::RasterImage;
use teleop_types::{Action, Command};

use crate::ingester::IngestState;

/// A value guarded by its own mutex, accessed only through copies.
#[derive(Debug, Default)]
pub struct StateCell<T> {
    inner: Mutex<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Copy the current value out under the lock.
    pub fn snapshot(&self) -> T {
        self.lock().clone()
    }

    /// Apply `f` to the value under the lock.  `f` must not block.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Replace the whole value.
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    // A panic in another loop must not wedge the container for everyone else.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The paired gesture/command state published by the primary sensor loop.
///
/// Fields are private so the pair can only be built through
/// [`ControlState::from_gesture`], which guarantees `active_command` is
/// never [`Action::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    observed_gesture: Action,
    active_command: Action,
}

impl ControlState {
    /// The state derived from one classified observation.
    pub fn from_gesture(gesture: Action) -> Self {
        Self {
            observed_gesture: gesture,
            active_command: gesture.or_stop(),
        }
    }

    pub fn observed_gesture(&self) -> Action {
        self.observed_gesture
    }

    /// Always a transmittable action.
    pub fn active_command(&self) -> Action {
        self.active_command
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::from_gesture(Action::None)
    }
}

/// Most recent traffic in each direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkLog {
    pub last_tx: Option<Command>,
    pub last_rx: Option<String>,
    /// Consecutive failed transmissions; reset on the next success.
    pub tx_failures: u32,
}

/// Latest secondary video frame, or `None` while the source is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryFeed {
    pub image: Option<RasterImage>,
    pub state: IngestState,
}

/// Handles to the three containers.  Cloning is cheap; all clones share the
/// same containers.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    pub control: Arc<StateCell<ControlState>>,
    pub log: Arc<StateCell<LinkLog>>,
    pub secondary: Arc<StateCell<SecondaryFeed>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a classified gesture; both fields change in one critical
    /// section.
    pub fn publish_gesture(&self, gesture: Action) {
        self.control.set(ControlState::from_gesture(gesture));
    }

    pub fn control_snapshot(&self) -> ControlState {
        self.control.snapshot()
    }

    pub fn log_snapshot(&self) -> LinkLog {
        self.log.snapshot()
    }

    pub fn secondary_snapshot(&self) -> SecondaryFeed {
        self.secondary.snapshot()
    }
}
