//! Configuration file – reads/writes `~/.teleop/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use teleop_runtime::IngestBackoff;
use teleop_runtime::config::{
    DEFAULT_ARBITER_PERIOD, DEFAULT_ESCALATE_AFTER, DEFAULT_PEER_PORT, DEFAULT_RECV_TIMEOUT,
    DEFAULT_STREAM_CONNECT_TIMEOUT, DEFAULT_STREAM_STALL_TIMEOUT, EngineConfig,
};
use teleop_types::TeleopError;
use tracing::{info, warn};

/// Which modality drives the foreground loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// One line of five finger flags per observation, e.g. `01100`.
    #[default]
    Gesture,
    /// One line of transcribed speech per observation.
    Voice,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Gesture => write!(f, "gesture"),
            InputMode::Voice => write!(f, "voice"),
        }
    }
}

impl std::str::FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gesture" => Ok(InputMode::Gesture),
            "voice" => Ok(InputMode::Voice),
            other => Err(format!("unknown input mode {other:?}")),
        }
    }
}

/// Persisted operator configuration stored in `~/.teleop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// IP address of the actuator.
    #[serde(default = "default_peer_addr")]
    pub peer_addr: String,

    /// UDP port the actuator listens on.
    #[serde(default = "default_port")]
    pub peer_port: u16,

    /// Local UDP port for actuator replies.
    #[serde(default = "default_port")]
    pub listen_port: u16,

    /// MJPEG stream of the secondary camera.  Empty disables it.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    #[serde(default)]
    pub input: InputMode,

    #[serde(default = "default_arbiter_period_ms")]
    pub arbiter_period_ms: u64,

    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    #[serde(default = "default_stream_connect_timeout_ms")]
    pub stream_connect_timeout_ms: u64,

    /// Silence from an open stream longer than this drops it.
    #[serde(default = "default_stream_stall_timeout_ms")]
    pub stream_stall_timeout_ms: u64,

    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,

    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Consecutive transmit failures between error reports.
    #[serde(default = "default_escalate_after")]
    pub escalate_after: u32,
}

fn default_peer_addr() -> String {
    "192.168.4.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PEER_PORT
}
fn default_stream_url() -> String {
    "http://192.168.4.2/stream".to_string()
}
fn default_arbiter_period_ms() -> u64 {
    DEFAULT_ARBITER_PERIOD.as_millis() as u64
}
fn default_recv_timeout_ms() -> u64 {
    DEFAULT_RECV_TIMEOUT.as_millis() as u64
}
fn default_stream_connect_timeout_ms() -> u64 {
    DEFAULT_STREAM_CONNECT_TIMEOUT.as_millis() as u64
}
fn default_stream_stall_timeout_ms() -> u64 {
    DEFAULT_STREAM_STALL_TIMEOUT.as_millis() as u64
}
fn default_connect_backoff_ms() -> u64 {
    IngestBackoff::default().connect.as_millis() as u64
}
fn default_reconnect_backoff_ms() -> u64 {
    IngestBackoff::default().reconnect.as_millis() as u64
}
fn default_escalate_after() -> u32 {
    DEFAULT_ESCALATE_AFTER
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_addr: default_peer_addr(),
            peer_port: default_port(),
            listen_port: default_port(),
            stream_url: default_stream_url(),
            input: InputMode::default(),
            arbiter_period_ms: default_arbiter_period_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
            stream_connect_timeout_ms: default_stream_connect_timeout_ms(),
            stream_stall_timeout_ms: default_stream_stall_timeout_ms(),
            connect_backoff_ms: default_connect_backoff_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            escalate_after: default_escalate_after(),
        }
    }
}

impl Config {
    /// Convert into the engine's view of the world and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Configuration`] for an unparsable peer
    /// address, a zero port or anything [`EngineConfig::validate`] rejects.
    pub fn to_engine_config(&self) -> Result<EngineConfig, TeleopError> {
        let ip: IpAddr = self.peer_addr.trim().parse().map_err(|e| {
            TeleopError::Configuration(format!("invalid peer_addr {:?}: {e}", self.peer_addr))
        })?;
        if self.listen_port == 0 {
            return Err(TeleopError::Configuration(
                "listen_port must be non-zero".to_string(),
            ));
        }
        let stream_url = Some(self.stream_url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let engine = EngineConfig {
            peer: SocketAddr::new(ip, self.peer_port),
            listen_port: self.listen_port,
            stream_url,
            arbiter_period: Duration::from_millis(self.arbiter_period_ms),
            recv_timeout: Duration::from_millis(self.recv_timeout_ms),
            backoff: IngestBackoff {
                connect: Duration::from_millis(self.connect_backoff_ms),
                reconnect: Duration::from_millis(self.reconnect_backoff_ms),
            },
            stream_connect_timeout: Duration::from_millis(self.stream_connect_timeout_ms),
            stream_stall_timeout: Duration::from_millis(self.stream_stall_timeout_ms),
            escalate_after: self.escalate_after,
        };
        engine.validate()?;
        Ok(engine)
    }
}

/// Return `$TELEOP_CONFIG`, or `~/.teleop/config.toml` when unset.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TELEOP_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".teleop").join("config.toml")
}

/// Load the config at `path`.  When the file does not exist the defaults
/// are written there first, so the operator has a file to edit.
/// Environment overrides are applied either way.
pub fn load_or_init(path: &Path) -> Result<Config, String> {
    let mut cfg = match load_from(path)? {
        Some(cfg) => cfg,
        None => {
            let cfg = Config::default();
            match save_to(&cfg, path) {
                Ok(()) => info!(path = %path.display(), "wrote default config"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `TELEOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELEOP_PEER_ADDR` | `peer_addr` |
/// | `TELEOP_PEER_PORT` | `peer_port` |
/// | `TELEOP_LISTEN_PORT` | `listen_port` |
/// | `TELEOP_STREAM_URL` | `stream_url` (empty disables the stream) |
/// | `TELEOP_INPUT` | `input` (`gesture` or `voice`) |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides looked up by variable name.
pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TELEOP_PEER_ADDR") {
        cfg.peer_addr = v;
    }
    if let Some(port) = lookup("TELEOP_PEER_PORT").and_then(|v| v.parse::<u16>().ok()) {
        cfg.peer_port = port;
    }
    if let Some(port) = lookup("TELEOP_LISTEN_PORT").and_then(|v| v.parse::<u16>().ok()) {
        cfg.listen_port = port;
    }
    if let Some(v) = lookup("TELEOP_STREAM_URL") {
        cfg.stream_url = v;
    }
    if let Some(mode) = lookup("TELEOP_INPUT").and_then(|v| v.parse::<InputMode>().ok()) {
        cfg.input = mode;
    }
}

/// Save the config to a specific path, creating its directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_convert_to_valid_engine_config() {
        let engine = Config::default().to_engine_config().expect("valid");
        assert_eq!(engine, EngineConfig::default());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "peer_addr = \"10.0.0.7\"\ninput = \"voice\"\nstream_url = \"\"\n")
            .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.peer_addr, "10.0.0.7");
        assert_eq!(cfg.input, InputMode::Voice);
        assert_eq!(cfg.peer_port, 3333);

        let engine = cfg.to_engine_config().unwrap();
        assert_eq!(engine.peer, "10.0.0.7:3333".parse().unwrap());
        assert_eq!(engine.stream_url, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "peer_port = \"not a number\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn load_or_init_writes_defaults_once() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        load_or_init(&path).expect("init");
        assert_eq!(load_from(&path).unwrap(), Some(Config::default()));

        std::fs::write(&path, "peer_addr = \"10.9.9.9\"\n").unwrap();
        load_or_init(&path).expect("load");
        let on_disk = load_from(&path).unwrap().unwrap();
        assert_eq!(on_disk.peer_addr, "10.9.9.9");
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_teleop_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".teleop"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn unparsable_peer_is_a_configuration_error() {
        let cfg = Config {
            peer_addr: "robot.local:3333".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            cfg.to_engine_config(),
            Err(TeleopError::Configuration(_))
        ));
    }

    #[test]
    fn zero_ports_and_period_are_rejected() {
        for cfg in [
            Config { peer_port: 0, ..Config::default() },
            Config { listen_port: 0, ..Config::default() },
            Config { arbiter_period_ms: 0, ..Config::default() },
            Config { stream_url: "ftp://cam".to_string(), ..Config::default() },
            Config { stream_stall_timeout_ms: 0, ..Config::default() },
        ] {
            assert!(cfg.to_engine_config().is_err(), "{cfg:?} should be rejected");
        }
    }

    #[test]
    fn input_mode_parses_case_insensitively() {
        assert_eq!("Voice".parse::<InputMode>(), Ok(InputMode::Voice));
        assert_eq!(" gesture ".parse::<InputMode>(), Ok(InputMode::Gesture));
        assert!("keyboard".parse::<InputMode>().is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn overrides_change_peer_and_input() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            vars(&[
                ("TELEOP_PEER_ADDR", "10.1.1.1"),
                ("TELEOP_PEER_PORT", "4444"),
                ("TELEOP_INPUT", "voice"),
                ("TELEOP_STREAM_URL", ""),
            ]),
        );
        assert_eq!(cfg.peer_addr, "10.1.1.1");
        assert_eq!(cfg.peer_port, 4444);
        assert_eq!(cfg.input, InputMode::Voice);
        assert_eq!(cfg.to_engine_config().unwrap().stream_url, None);
    }

    #[test]
    fn overrides_ignore_unparsable_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            vars(&[("TELEOP_LISTEN_PORT", "not-a-port"), ("TELEOP_INPUT", "keyboard")]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn no_overrides_leave_config_untouched() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |_| None);
        assert_eq!(cfg, Config::default());
    }
}
