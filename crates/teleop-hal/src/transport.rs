//! Datagram transport to the remote actuator.
//!
//! The outbound side is a [`CommandLink`]: one ASCII byte per datagram,
//! fire-and-forget, no acknowledgment.  The inbound side is a
//! [`DatagramSource`] polled with a bounded wait so the caller stays
//! responsive to shutdown.
//!
//! [`UdpCommandLink`] and [`UdpReceiver`] are the production drivers; the
//! runtime only ever talks to the traits, so tests swap in scripted fakes.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use teleop_types::{Command, TeleopError};
use tracing::debug;

/// Largest inbound payload the receiver reads; longer datagrams are
/// truncated by the socket.
pub const MAX_INBOUND_DATAGRAM: usize = 64;

/// Outbound half of the transport: sends one [`Command`] per datagram.
pub trait CommandLink: Send {
    /// Human-readable peer identifier used in logs, e.g. `"192.168.4.1:3333"`.
    fn peer(&self) -> String;

    /// Transmit `command` once.  No retry, no acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] if the datagram cannot be handed to
    /// the network stack.
    fn send(&mut self, command: Command) -> Result<(), TeleopError>;
}

/// Inbound half of the transport.
pub trait DatagramSource: Send {
    /// Wait a bounded time for one datagram and copy it into `buf`.
    ///
    /// Returns `Ok(Some(len))` on receipt and `Ok(None)` when the wait timed
    /// out with nothing to read.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] for any other receive failure.
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TeleopError>;
}

/// UDP command link bound to an ephemeral local port.
pub struct UdpCommandLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpCommandLink {
    /// Bind an ephemeral socket of the same address family as `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] if no local socket can be bound.
    pub fn new(peer: SocketAddr) -> Result<Self, TeleopError> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(|e| transport_error(&peer.to_string(), &e))?;
        Ok(Self { socket, peer })
    }
}

impl CommandLink for UdpCommandLink {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    fn send(&mut self, command: Command) -> Result<(), TeleopError> {
        self.socket
            .send_to(&[command.as_byte()], self.peer)
            .map(|_| ())
            .map_err(|e| transport_error(&self.peer.to_string(), &e))
    }
}

/// UDP receiver bound once to a fixed local port, with a read timeout.
pub struct UdpReceiver {
    socket: UdpSocket,
    local: SocketAddr,
}

impl UdpReceiver {
    /// Bind `0.0.0.0:port` and configure a read timeout of `timeout`.
    ///
    /// Pass port `0` to let the OS pick one (useful in tests).
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Transport`] if the port cannot be bound or the
    /// timeout is rejected (e.g. a zero duration).
    pub fn bind(port: u16, timeout: Duration) -> Result<Self, TeleopError> {
        let endpoint = format!("0.0.0.0:{port}");
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|e| transport_error(&endpoint, &e))?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| transport_error(&endpoint, &e))?;
        let local = socket
            .local_addr()
            .map_err(|e| transport_error(&endpoint, &e))?;
        debug!(local = %local, "udp receiver bound");
        Ok(Self { socket, local })
    }

    /// The address the receiver is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl DatagramSource for UdpReceiver {
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TeleopError> {
        match self.socket.recv_from(buf) {
            Ok((len, _from)) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(transport_error(&self.local.to_string(), &e)),
        }
    }
}

fn transport_error(endpoint: &str, err: &io::Error) -> TeleopError {
    TeleopError::Transport {
        endpoint: endpoint.to_string(),
        details: err.to_string(),
    }
}
