//! [`Arbiter`] – turns the continuously published active command into a
//! deduplicated stream of transmissions.
//!
//! Every period the arbiter snapshots the active command and transmits it
//! only when it differs from the last command that was *successfully* sent.
//! A failed transmission leaves the last-sent value untouched, so the next
//! tick retries the same command.  There is no backoff; the retry cadence is
//! the arbiter period.
//!
//! Consecutive failures are counted and mirrored into
//! [`LinkLog::tx_failures`][crate::store::LinkLog::tx_failures].  The first
//! failure of a streak is logged at `warn`; every `escalate_after`-th one at
//! `error`.

use std::time::Duration;

use teleop_hal::CommandLink;
use teleop_types::{Action, Command};
use tracing::{debug, error, info, warn};

use crate::shutdown::ShutdownToken;
use crate::store::SharedStore;

pub struct Arbiter {
    link: Box<dyn CommandLink>,
    store: SharedStore,
    last_sent: Option<Action>,
    consecutive_failures: u32,
    escalate_after: u32,
}

impl Arbiter {
    /// `escalate_after` of `0` disables `error`-level escalation.
    pub fn new(link: Box<dyn CommandLink>, store: SharedStore, escalate_after: u32) -> Self {
        Self {
            link,
            store,
            last_sent: None,
            consecutive_failures: 0,
            escalate_after,
        }
    }

    /// The last action whose command was successfully transmitted.
    pub fn last_sent(&self) -> Option<Action> {
        self.last_sent
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run one arbitration step.
    ///
    /// Returns the command transmitted on this tick, if any.
    pub fn tick(&mut self) -> Option<Command> {
        let active = self.store.control_snapshot().active_command();
        if self.last_sent == Some(active) {
            return None;
        }
        let command = active.command()?;
        if self.transmit(command) {
            self.last_sent = Some(active);
            Some(command)
        } else {
            None
        }
    }

    /// Tick every `period` until `shutdown` is cancelled, then leave the
    /// actuator stopped.
    pub fn run(mut self, period: Duration, shutdown: &ShutdownToken) {
        info!(peer = %self.link.peer(), period_ms = period.as_millis() as u64, "arbiter started");
        while !shutdown.is_cancelled() {
            self.tick();
            if shutdown.wait_timeout(period) {
                break;
            }
        }
        self.stop_on_exit();
        info!("arbiter stopped");
    }

    /// One best-effort `S` so the actuator is not left driving.
    fn stop_on_exit(&mut self) {
        if self.last_sent != Some(Action::Stop) && self.transmit(Command::Stop) {
            self.last_sent = Some(Action::Stop);
        }
    }

    fn transmit(&mut self, command: Command) -> bool {
        match self.link.send(command) {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    info!(failures = self.consecutive_failures, "transmission recovered");
                }
                self.consecutive_failures = 0;
                self.store.log.update(|log| {
                    log.last_tx = Some(command);
                    log.tx_failures = 0;
                });
                debug!(%command, "command sent");
                true
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let failures = self.consecutive_failures;
                self.store.log.update(|log| log.tx_failures = failures);
                if failures == 1 {
                    warn!(%command, error = %e, "transmission failed; retrying every tick");
                } else if self.escalate_after > 0 && failures % self.escalate_after == 0 {
                    error!(%command, failures, error = %e, "peer unreachable");
                } else {
                    debug!(%command, failures, error = %e, "transmission failed");
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use teleop_types::TeleopError;

    /// Records every successful send; fails the first `fail_next` attempts.
    #[derive(Clone, Default)]
    struct RecordingLink {
        sent: Arc<Mutex<Vec<Command>>>,
        fail_next: Arc<Mutex<u32>>,
    }

    impl RecordingLink {
        fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }

        fn fail(&self, n: u32) {
            *self.fail_next.lock().unwrap() = n;
        }
    }

    impl CommandLink for RecordingLink {
        fn peer(&self) -> String {
            "test-peer".to_string()
        }

        fn send(&mut self, command: Command) -> Result<(), TeleopError> {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(TeleopError::Transport {
                    endpoint: self.peer(),
                    details: "network unreachable".to_string(),
                });
            }
            self.sent.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn arbiter() -> (Arbiter, RecordingLink, SharedStore) {
        let link = RecordingLink::default();
        let store = SharedStore::new();
        let arbiter = Arbiter::new(Box::new(link.clone()), store.clone(), 3);
        (arbiter, link, store)
    }

    #[test]
    fn transmits_only_distinct_consecutive_commands() {
        let (mut arbiter, link, store) = arbiter();
        for action in [Action::Stop, Action::Stop, Action::Forward, Action::Forward, Action::Left] {
            store.publish_gesture(action);
            arbiter.tick();
        }
        assert_eq!(link.sent(), vec![Command::Stop, Command::Forward, Command::Left]);
    }

    #[test]
    fn repeated_publish_sends_once() {
        let (mut arbiter, link, store) = arbiter();
        for _ in 0..10 {
            store.publish_gesture(Action::Right);
            arbiter.tick();
        }
        assert_eq!(link.sent(), vec![Command::Right]);
        assert_eq!(arbiter.last_sent(), Some(Action::Right));
    }

    #[test]
    fn none_gesture_is_sent_as_stop() {
        let (mut arbiter, link, store) = arbiter();
        store.publish_gesture(Action::Back);
        arbiter.tick();
        store.publish_gesture(Action::None);
        assert_eq!(arbiter.tick(), Some(Command::Stop));
        assert_eq!(link.sent(), vec![Command::Back, Command::Stop]);
    }

    #[test]
    fn failed_send_is_retried_next_tick() {
        let (mut arbiter, link, store) = arbiter();
        link.fail(2);
        store.publish_gesture(Action::Left);

        assert_eq!(arbiter.tick(), None);
        assert_eq!(arbiter.last_sent(), None);
        assert_eq!(store.log_snapshot().tx_failures, 1);

        assert_eq!(arbiter.tick(), None);
        assert_eq!(arbiter.consecutive_failures(), 2);
        assert_eq!(store.log_snapshot().tx_failures, 2);

        assert_eq!(arbiter.tick(), Some(Command::Left));
        assert_eq!(arbiter.last_sent(), Some(Action::Left));
        assert_eq!(arbiter.consecutive_failures(), 0);
        let log = store.log_snapshot();
        assert_eq!(log.last_tx, Some(Command::Left));
        assert_eq!(log.tx_failures, 0);
        assert_eq!(link.sent(), vec![Command::Left]);
    }

    #[test]
    fn failed_send_does_not_update_last_tx() {
        let (mut arbiter, link, store) = arbiter();
        store.publish_gesture(Action::Forward);
        arbiter.tick();
        link.fail(1);
        store.publish_gesture(Action::Back);
        arbiter.tick();
        assert_eq!(store.log_snapshot().last_tx, Some(Command::Forward));
    }

    #[test]
    fn run_exits_on_shutdown_and_leaves_actuator_stopped() {
        let (arbiter, link, store) = arbiter();
        let shutdown = ShutdownToken::new();
        store.publish_gesture(Action::Forward);

        let handle = {
            let shutdown = shutdown.clone();
            thread::spawn(move || arbiter.run(Duration::from_millis(5), &shutdown))
        };
        for _ in 0..400 {
            if link.sent().contains(&Command::Forward) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        shutdown.cancel();
        handle.join().unwrap();

        let sent = link.sent();
        assert_eq!(sent.first(), Some(&Command::Forward));
        assert_eq!(sent.last(), Some(&Command::Stop));
    }
}
