//! [`InboundListener`] – drains the receive side of the transport.
//!
//! Payloads are decoded as lossy UTF-8 and overwrite
//! [`LinkLog::last_rx`][crate::store::LinkLog::last_rx]; there is no queue, only the
//! latest message is kept.  Receive errors are logged and swallowed.

use teleop_hal::{DatagramSource, MAX_INBOUND_DATAGRAM};
use tracing::{debug, info, trace};

use crate::shutdown::ShutdownToken;
use crate::store::SharedStore;

pub struct InboundListener {
    source: Box<dyn DatagramSource>,
    store: SharedStore,
    buf: [u8; MAX_INBOUND_DATAGRAM],
}

impl InboundListener {
    /// `source` must already be bound; the listener never rebinds.
    pub fn new(source: Box<dyn DatagramSource>, store: SharedStore) -> Self {
        Self {
            source,
            store,
            buf: [0u8; MAX_INBOUND_DATAGRAM],
        }
    }

    /// Wait once for a datagram.  Returns the decoded text when one arrived.
    pub fn poll_once(&mut self) -> Option<String> {
        match self.source.recv(&mut self.buf) {
            Ok(Some(len)) => {
                let text = String::from_utf8_lossy(&self.buf[..len]).into_owned();
                trace!(len, text = %text, "datagram received");
                let published = text.clone();
                self.store.log.update(|log| log.last_rx = Some(published));
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "receive failed");
                None
            }
        }
    }

    /// Poll until `shutdown` is cancelled.  The receive timeout bounds how
    /// long cancellation takes to be noticed.
    pub fn run(mut self, shutdown: &ShutdownToken) {
        info!("inbound listener started");
        while !shutdown.is_cancelled() {
            self.poll_once();
        }
        info!("inbound listener stopped");
    }
}
