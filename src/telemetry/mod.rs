//! Console rendering of monitor events and tracing setup.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::execution::ExecutionEvent;

pub const STATUS_COLOR: &str = "\x1b[32m"; // green
pub const NODE_COLOR: &str = "\x1b[36m"; // cyan
pub const ERROR_COLOR: &str = "\x1b[31m"; // red
pub const RESET_COLOR: &str = "\x1b[0m";

/// Install the default tracing subscriber: env-filtered fmt output plus
/// span traces for error reports. Safe to call once at program start;
/// subsequent calls fail quietly if a subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Formatter color mode for monitor output.
///
/// - [`FormatterMode::Auto`]: detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: always include color codes
/// - [`FormatterMode::Plain`]: never include color codes (for logs/files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    /// Returns true if this mode should use colored output.
    ///
    /// For `Auto` mode, performs TTY detection on each call.
    #[must_use]
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Renders execution events for human consumption.
pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &ExecutionEvent) -> String;
}

/// Plain text formatter with optional ANSI color codes.
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    /// A formatter with auto-detected color mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    /// A formatter with an explicit color mode.
    #[must_use]
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn color<'a>(&self, ansi_code: &'a str) -> &'a str {
        if self.mode.is_colored() {
            ansi_code
        } else {
            ""
        }
    }

    fn reset(&self) -> &str {
        if self.mode.is_colored() {
            RESET_COLOR
        } else {
            ""
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &ExecutionEvent) -> String {
        let id = event.execution_id();
        match event {
            ExecutionEvent::StatusChanged { status, .. } => format!(
                "[{id}] {}status{} {status}",
                self.color(STATUS_COLOR),
                self.reset()
            ),
            ExecutionEvent::NodeStatusChanged {
                node_id,
                status,
                error,
                ..
            } => {
                let mut line = format!(
                    "[{id}] {}{node_id}{} {status}",
                    self.color(NODE_COLOR),
                    self.reset()
                );
                if let Some(error) = error {
                    line.push_str(&format!(
                        " {}{error}{}",
                        self.color(ERROR_COLOR),
                        self.reset()
                    ));
                }
                line
            }
            ExecutionEvent::NodeProgress {
                node_id, message, ..
            } => format!(
                "[{id}] {}{node_id}{} {message}",
                self.color(NODE_COLOR),
                self.reset()
            ),
            ExecutionEvent::InteractivePrompt {
                node_id, prompt, ..
            } => format!("[{id}] {node_id} awaiting response: {prompt}"),
            ExecutionEvent::InteractiveResponse { node_id, .. } => {
                format!("[{id}] {node_id} response recorded")
            }
            ExecutionEvent::Error { message, .. } => format!(
                "[{id}] {}error{} {message}",
                self.color(ERROR_COLOR),
                self.reset()
            ),
            ExecutionEvent::BatchUpdate { events, .. } => events
                .iter()
                .map(|inner| self.render_event(inner))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStatus;
    use crate::ids::ExecutionId;

    #[test]
    fn plain_mode_renders_without_ansi_codes() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
        let line = formatter.render_event(&ExecutionEvent::StatusChanged {
            execution_id: ExecutionId::new("exec_1"),
            status: ExecutionStatus::Running,
        });
        assert_eq!(line, "[exec_1] status RUNNING");
    }

    #[test]
    fn colored_mode_includes_ansi_codes() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Colored);
        let line = formatter.render_event(&ExecutionEvent::Error {
            execution_id: ExecutionId::new("exec_1"),
            message: "boom".into(),
        });
        assert!(line.contains(ERROR_COLOR));
        assert!(line.contains(RESET_COLOR));
    }
}
