//! [`EngineConfig`] – every tunable the engine consumes.
//!
//! Nothing inside the loops is hard-coded; the entry point builds one of
//! these (typically from a config file) and [`EngineConfig::validate`]s it
//! before anything is bound or spawned.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use teleop_types::TeleopError;

use crate::ingester::IngestBackoff;

pub const DEFAULT_PEER_PORT: u16 = 3333;
pub const DEFAULT_ARBITER_PERIOD: Duration = Duration::from_millis(50);
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_STREAM_STALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ESCALATE_AFTER: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Actuator address commands are sent to.
    pub peer: SocketAddr,
    /// Local UDP port the inbound listener binds.
    pub listen_port: u16,
    /// Secondary video stream; `None` runs without one.
    pub stream_url: Option<String>,
    pub arbiter_period: Duration,
    pub recv_timeout: Duration,
    pub backoff: IngestBackoff,
    pub stream_connect_timeout: Duration,
    /// Longest silence tolerated from an open stream before it is treated
    /// as dropped.
    pub stream_stall_timeout: Duration,
    /// Consecutive transmit failures between `error`-level reports.
    pub escalate_after: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            peer: SocketAddr::from((Ipv4Addr::new(192, 168, 4, 1), DEFAULT_PEER_PORT)),
            listen_port: DEFAULT_PEER_PORT,
            stream_url: Some("http://192.168.4.2/stream".to_string()),
            arbiter_period: DEFAULT_ARBITER_PERIOD,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            backoff: IngestBackoff::default(),
            stream_connect_timeout: DEFAULT_STREAM_CONNECT_TIMEOUT,
            stream_stall_timeout: DEFAULT_STREAM_STALL_TIMEOUT,
            escalate_after: DEFAULT_ESCALATE_AFTER,
        }
    }
}

impl EngineConfig {
    /// Reject values the loops cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Configuration`] naming the offending option.
    pub fn validate(&self) -> Result<(), TeleopError> {
        let invalid = |msg: &str| Err(TeleopError::Configuration(msg.to_string()));
        if self.peer.port() == 0 {
            return invalid("peer port must be non-zero");
        }
        if self.peer.ip().is_unspecified() {
            return invalid("peer address must not be unspecified");
        }
        if self.arbiter_period.is_zero() {
            return invalid("arbiter period must be non-zero");
        }
        if self.recv_timeout.is_zero() {
            return invalid("receive timeout must be non-zero");
        }
        if self.stream_connect_timeout.is_zero() {
            return invalid("stream connect timeout must be non-zero");
        }
        if self.stream_stall_timeout.is_zero() {
            return invalid("stream stall timeout must be non-zero");
        }
        if let Some(url) = &self.stream_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(TeleopError::Configuration(format!(
                "stream url must be http(s), got {url:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.arbiter_period, Duration::from_millis(50));
        assert_eq!(cfg.recv_timeout, Duration::from_secs(1));
        assert_eq!(cfg.backoff.connect, Duration::from_secs(2));
        assert_eq!(cfg.backoff.reconnect, Duration::from_secs(1));
    }

    #[test]
    fn zero_period_is_rejected() {
        let cfg = EngineConfig {
            arbiter_period: Duration::ZERO,
            ..EngineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("arbiter period"));
    }

    #[test]
    fn zero_stall_timeout_is_rejected() {
        let cfg = EngineConfig {
            stream_stall_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stall timeout"));
    }

    #[test]
    fn unspecified_peer_is_rejected() {
        let cfg = EngineConfig {
            peer: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3333)),
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(TeleopError::Configuration(_))));
    }

    #[test]
    fn non_http_stream_url_is_rejected() {
        let cfg = EngineConfig {
            stream_url: Some("rtsp://cam/stream".to_string()),
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let without_stream = EngineConfig {
            stream_url: None,
            ..EngineConfig::default()
        };
        assert!(without_stream.validate().is_ok());
    }
}
