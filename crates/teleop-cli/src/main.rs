//! `teleop` – operator console for the teleoperation engine.
//!
//! The binary:
//!
//! 1. Loads `~/.teleop/config.toml` (or `$TELEOP_CONFIG`) with `TELEOP_*`
//!    environment overrides; an invalid config exits with status 2.
//! 2. Binds the UDP link and starts the arbiter, inbound listener and
//!    secondary stream ingester.
//! 3. Runs the foreground sensor loop over stdin, one observation per line,
//!    printing a status line whenever the dashboard changes.
//! 4. On Ctrl-C or end of input, stops every loop; the arbiter leaves the
//!    actuator with a final STOP.

mod config;
mod console;
mod display;

use colored::Colorize;
use std::io::BufReader;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use teleop_hal::{Classifier, FlagsClassifier, Sensor, TranscriptSensor, VoiceClassifier};
use teleop_runtime::{Engine, EngineParts, SensorLoop, SharedStore, ShutdownToken, init_tracing};
use teleop_types::TeleopError;

use config::InputMode;
use console::{FlagLines, TranscriptLines};
use display::TerminalRenderer;

const EXIT_RUNTIME: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let _otel_guard = init_tracing("teleop");

    print_banner();

    let config_path = config::config_path();
    let cfg = match config::load_or_init(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let engine_config = match cfg.to_engine_config() {
        Ok(engine_config) => engine_config,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    println!("  Config from {}", config_path.display().to_string().bold());
    println!(
        "  Actuator {}  listening on :{}  camera {}  input {}",
        engine_config.peer.to_string().bold(),
        engine_config.listen_port,
        engine_config.stream_url.as_deref().unwrap_or("none").dimmed(),
        cfg.input.to_string().bold(),
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = ShutdownToken::new();
    let token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        token.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with end of input instead");
    }

    // ── Engine ────────────────────────────────────────────────────────────
    let parts = match EngineParts::udp(&engine_config) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "cannot open transports");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };
    let store = SharedStore::new();
    let handle = match Engine::start(&engine_config, parts, store.clone(), shutdown.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "cannot start engine");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(loops = ?handle.loops(), "engine started");

    match cfg.input {
        InputMode::Gesture => println!("  Enter five finger flags per line, e.g. {}.\n", "01100".bold()),
        InputMode::Voice => println!("  Enter one spoken command per line, e.g. {}.\n", "turn left".bold()),
    }

    // ── Foreground loop ───────────────────────────────────────────────────
    // Runs on its own thread: a blocking stdin read must not delay Ctrl-C.
    let input = cfg.input;
    let token = shutdown.clone();
    let foreground = thread::Builder::new()
        .name("teleop-sensor".to_string())
        .spawn(move || {
            let stdin = BufReader::new(std::io::stdin());
            let result = match input {
                InputMode::Gesture => {
                    run_foreground(FlagLines::new(stdin), FlagsClassifier, store, &token)
                }
                InputMode::Voice => run_foreground(
                    TranscriptSensor::new(TranscriptLines::new(stdin)),
                    VoiceClassifier,
                    store,
                    &token,
                ),
            };
            token.cancel();
            result
        });
    let foreground = match foreground {
        Ok(thread) => thread,
        Err(e) => {
            error!(error = %e, "cannot spawn sensor loop");
            handle.shutdown();
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    while !shutdown.wait_timeout(Duration::from_millis(200)) {}
    handle.shutdown();

    // A sensor loop still blocked on stdin is abandoned at process exit.
    if !foreground.is_finished() {
        println!("{}", "  ✓ Actuator stopped.".green());
        return ExitCode::SUCCESS;
    }
    match foreground.join() {
        Ok(Ok(())) => {
            println!("{}", "  ✓ Actuator stopped.".green());
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = %e, "sensor loop failed");
            ExitCode::from(EXIT_RUNTIME)
        }
        Err(_) => {
            error!("sensor loop panicked");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

fn run_foreground<S, C>(
    sensor: S,
    classifier: C,
    store: SharedStore,
    shutdown: &ShutdownToken,
) -> Result<(), TeleopError>
where
    S: Sensor,
    C: Classifier<S::Observation>,
{
    SensorLoop::new(sensor, classifier, store)
        .with_renderer(Box::new(TerminalRenderer::stdout()))
        .run(shutdown)
}

fn print_banner() {
    println!();
    println!("{}", "  ┌─────────────────────────────┐".bold().cyan());
    println!("{}", "  │   teleop · operator console │".bold().cyan());
    println!("{}", "  └─────────────────────────────┘".bold().cyan());
    println!("  {}", format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!();
}
