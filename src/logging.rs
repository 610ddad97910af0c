//! Tracing layer that formats events as single lines and hands them to a
//! [`LogSink`].
//!
//! The browser build routes lines to the developer console, the terminal
//! build to stderr. Tests use [`CaptureSink`] to assert on what was logged.
//!
//! ```no_run
//! use agent_mission::logging::{self, StderrSink};
//! use tracing_subscriber::EnvFilter;
//!
//! logging::init(StderrSink, EnvFilter::new("info,agent_mission::mission=debug"));
//! tracing::info!("mission ready");
//! ```

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Destination for formatted log lines.
pub trait LogSink: Send + Sync + 'static {
    fn write_line(&self, level: Level, line: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_line(&self, _level: Level, line: &str) {
        eprintln!("{line}");
    }
}

/// Keeps formatted lines in memory.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for CaptureSink {
    fn write_line(&self, _level: Level, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_string());
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[cfg(target_arch = "wasm32")]
impl LogSink for ConsoleSink {
    fn write_line(&self, level: Level, line: &str) {
        let value = wasm_bindgen::JsValue::from_str(line);
        match level {
            Level::ERROR => web_sys::console::error_1(&value),
            Level::WARN => web_sys::console::warn_1(&value),
            Level::INFO => web_sys::console::info_1(&value),
            _ => web_sys::console::debug_1(&value),
        }
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN ",
        Level::INFO => "INFO ",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Formats `LEVEL target: message key=value ...` lines.
pub struct LineLayer<K> {
    sink: K,
    max_level: Level,
}

impl<K: LogSink> LineLayer<K> {
    pub fn new(sink: K, max_level: Level) -> Self {
        Self { sink, max_level }
    }
}

impl<S, K> Layer<S> for LineLayer<K>
where
    S: Subscriber,
    K: LogSink,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut line = format!("{} {}:", level_str(*metadata.level()), metadata.target());
        if let Some(message) = visitor.message {
            let _ = write!(line, " {message}");
        }
        for (name, value) in visitor.fields {
            let _ = write!(line, " {name}={value}");
        }

        self.sink.write_line(*metadata.level(), &line);
    }
}

/// Installs the line layer as the global subscriber, behind `filter`.
/// Later calls are ignored.
pub fn init<K: LogSink>(sink: K, filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(LineLayer::new(sink, Level::TRACE))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<F: FnOnce()>(max_level: Level, f: F) -> Vec<String> {
        let sink = CaptureSink::new();
        let subscriber =
            tracing_subscriber::registry().with(LineLayer::new(sink.clone(), max_level));
        tracing::subscriber::with_default(subscriber, f);
        sink.lines()
    }

    #[test]
    fn formats_message_and_fields() {
        let lines = capture(Level::INFO, || {
            tracing::info!(target: "mission", stage = 2, "stage answered");
        });

        assert_eq!(lines, vec!["INFO  mission: stage answered stage=2".to_string()]);
    }

    #[test]
    fn string_fields_are_not_quoted() {
        let lines = capture(Level::INFO, || {
            tracing::warn!(target: "report", error = "offline", "submission failed");
        });

        assert_eq!(
            lines,
            vec!["WARN  report: submission failed error=offline".to_string()]
        );
    }

    #[test]
    fn drops_events_above_max_level() {
        let lines = capture(Level::INFO, || {
            tracing::debug!("noise");
            tracing::error!("kept");
        });

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERROR"));
    }

    #[test]
    fn env_filter_applies_per_target_levels() {
        let sink = CaptureSink::new();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("warn,mission=debug"))
            .with(LineLayer::new(sink.clone(), Level::TRACE));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "mission", "stage answered");
            tracing::info!(target: "report", "result submitted");
            tracing::warn!(target: "report", "result submission failed");
        });

        assert_eq!(
            sink.lines(),
            vec![
                "DEBUG mission: stage answered".to_string(),
                "WARN  report: result submission failed".to_string(),
            ]
        );
    }
}
