//! Terminal dashboard.
//!
//! Prints one status line per change of the composed view rather than per
//! frame, so a 20 Hz sensor loop does not flood the terminal.

use std::io::Write;

use colored::Colorize;
use teleop_runtime::{DashboardView, Flow, IngestState, Renderer};
use teleop_types::{Action, TeleopError};

pub struct TerminalRenderer {
    out: Box<dyn Write + Send>,
    last_line: Option<String>,
}

impl TerminalRenderer {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            last_line: None,
        }
    }
}

/// Uncoloured status line, used for change detection.
fn status_line(view: &DashboardView) -> String {
    let mut line = format!(
        "gesture {:<7} active {:<7} {}  camera {} ({})",
        view.gesture,
        view.active,
        view.log_line(),
        view.secondary_banner(),
        view.secondary_state,
    );
    if view.tx_failures > 0 {
        line.push_str(&format!("  tx failures {}", view.tx_failures));
    }
    line
}

fn paint(view: &DashboardView) -> String {
    let active = match view.active {
        Action::Stop => view.active.to_string().red().bold(),
        _ => view.active.to_string().green().bold(),
    };
    let camera = match view.secondary_state {
        IngestState::Streaming => view.secondary_banner().green(),
        _ => view.secondary_banner().yellow(),
    };
    let mut line = format!(
        "gesture {:<7} active {:<7} {}  camera {} ({})",
        view.gesture.to_string().cyan(),
        active,
        view.log_line().dimmed(),
        camera,
        view.secondary_state,
    );
    if view.tx_failures > 0 {
        line.push_str(&format!("  {}", format!("tx failures {}", view.tx_failures).red()));
    }
    line
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, view: &DashboardView) -> Result<Flow, TeleopError> {
        let line = status_line(view);
        if self.last_line.as_deref() == Some(line.as_str()) {
            return Ok(Flow::Continue);
        }
        writeln!(self.out, "  {}", paint(view))
            .and_then(|()| self.out.flush())
            .map_err(|e| TeleopError::Render(e.to_string()))?;
        self.last_line = Some(line);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use teleop_runtime::SharedStore;
    use teleop_types::Command;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn lines(&self) -> usize {
            String::from_utf8_lossy(&self.0.lock().unwrap()).lines().count()
        }
    }

    #[test]
    fn status_line_summarises_view() {
        let store = SharedStore::new();
        store.publish_gesture(Action::Right);
        store.log.update(|log| {
            log.last_tx = Some(Command::Right);
            log.tx_failures = 2;
        });
        let line = status_line(&DashboardView::compose(&store));
        assert!(line.contains("active RIGHT"), "{line}");
        assert!(line.contains("TX → R"), "{line}");
        assert!(line.contains("CAMERA OFFLINE"), "{line}");
        assert!(line.contains("tx failures 2"), "{line}");
    }

    #[test]
    fn prints_only_when_view_changes() {
        let sink = Sink::default();
        let mut renderer = TerminalRenderer::new(Box::new(sink.clone()));
        let store = SharedStore::new();

        let view = DashboardView::compose(&store);
        assert_eq!(renderer.render(&view), Ok(Flow::Continue));
        assert_eq!(renderer.render(&view), Ok(Flow::Continue));
        assert_eq!(sink.lines(), 1);

        store.publish_gesture(Action::Left);
        renderer.render(&DashboardView::compose(&store)).unwrap();
        assert_eq!(sink.lines(), 2);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_a_render_error() {
        let mut renderer = TerminalRenderer::new(Box::new(Broken));
        let err = renderer
            .render(&DashboardView::compose(&SharedStore::new()))
            .unwrap_err();
        assert!(matches!(err, TeleopError::Render(_)));
    }
}
