use colored::{Color, Colorize};
use std::io::Write;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};

use crate::clock::{TimeZone, Timestamper, DEFAULT_CONSOLE_FORMAT};
use crate::compose::{compose_inner, compose_outer, INNER_SEP, OUTER_SEP};
use crate::layer::capture;
use crate::level::Level;
use crate::record::LogEvent;

/// Label (padded to a fixed width) and color per known level.
const LEVEL_STYLES: &[(Level, &str, Color)] = &[
    (Level::NOTSET, "NOTSET   ", Color::Cyan),
    (Level::DEBUG, "DEBUG    ", Color::BrightMagenta),
    (Level::INFO, "INFO     ", Color::BrightCyan),
    (Level::WARNING, "WARNING  ", Color::Blue),
    (Level::ERROR, "ERROR    ", Color::Red),
    (Level::CRITICAL, "CRITICAL ", Color::BrightRed),
];

/// Style used for unrecognized level numbers: no label, yellow message.
const FALLBACK_STYLE: (&str, Color) = ("", Color::Yellow);

fn level_style(level: Level) -> (&'static str, Color) {
    LEVEL_STYLES
        .iter()
        .find(|(l, _, _)| *l == level)
        .map(|(_, label, color)| (*label, *color))
        .unwrap_or(FALLBACK_STYLE)
}

/// Which console segments are shown, and in which colors.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Emit ANSI colors. When `false` the color settings are ignored.
    pub colorful: bool,

    pub show_datetime: bool,
    pub datetime_color: Color,
    pub datetime: Timestamper,

    pub show_level: bool,

    pub show_logger_name: bool,
    /// Number of trailing path components of the source file to show;
    /// `0` shows the whole path.
    pub file_depth: usize,
    pub show_file: bool,
    pub show_line: bool,
    pub show_func: bool,
    pub file_color: Color,

    pub show_process_name: bool,
    pub show_process_id: bool,
    pub show_thread_name: bool,
    pub show_thread_id: bool,
    pub process_thread_color: Color,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            colorful: true,
            show_datetime: true,
            datetime_color: Color::Green,
            datetime: Timestamper::new(TimeZone::Local, DEFAULT_CONSOLE_FORMAT),
            show_level: true,
            show_logger_name: true,
            file_depth: 1,
            show_file: true,
            show_line: true,
            show_func: true,
            file_color: Color::Magenta,
            show_process_name: false,
            show_process_id: false,
            show_thread_name: false,
            show_thread_id: false,
            process_thread_color: Color::Blue,
        }
    }
}

impl DisplayConfig {
    /// Same segments as the default, without colors.
    pub fn plain() -> Self {
        DisplayConfig { colorful: false, ..Default::default() }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.colorful && !text.is_empty() {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

fn truncate_path(path: &str, depth: usize) -> String {
    let parts: Vec<&str> = path.split(['/', '\\']).collect();
    let skip = if depth == 0 { 0 } else { parts.len().saturating_sub(depth) };
    parts[skip..].join("/")
}

fn process_thread_block(event: &LogEvent, config: &DisplayConfig) -> String {
    let process = compose_inner(
        [
            (config.show_process_name, event.process.name.clone()),
            (config.show_process_id, event.process.id.to_string()),
        ],
        INNER_SEP,
    );
    let thread = compose_inner(
        [
            (config.show_thread_name, event.thread.name.clone()),
            (config.show_thread_id, event.thread.id.to_string()),
        ],
        INNER_SEP,
    );
    compose_outer([process, thread], OUTER_SEP)
}

// Fragments whose source information is missing (events without file or
// line metadata) are skipped like hidden ones.
fn location_block(event: &LogEvent, config: &DisplayConfig) -> String {
    let logger_name = compose_inner([(config.show_logger_name, &event.name)], INNER_SEP);
    let file = compose_inner(
        [
            (
                config.show_file && !event.pathname.is_empty(),
                truncate_path(&event.pathname, config.file_depth),
            ),
            (config.show_line && event.lineno != 0, event.lineno.to_string()),
        ],
        INNER_SEP,
    );
    let function = event
        .func_name
        .as_deref()
        .or(Some(event.module.as_str()).filter(|m| !m.is_empty()));
    let function = compose_inner(
        [(
            config.show_func && function.is_some(),
            format!("{}()", function.unwrap_or_default()),
        )],
        INNER_SEP,
    );
    compose_outer([logger_name, file, function], OUTER_SEP)
}

/// Render `event` as one console line.
///
/// Segments, left to right: timestamp, level label, process/thread block,
/// source-location block, message. Hidden segments leave no separator
/// behind. Exception and stack text follow on their own lines.
pub fn render(event: &LogEvent, config: &DisplayConfig) -> String {
    let (label, level_color) = level_style(event.level);

    let datetime = compose_inner(
        [(config.show_datetime, config.datetime.format(&event.created))],
        INNER_SEP,
    );
    let level = compose_inner([(config.show_level, label)], INNER_SEP);

    let mut line = String::new();
    if !datetime.is_empty() {
        line.push_str(&config.paint(&datetime, config.datetime_color));
        line.push(' ');
    }
    line.push_str(&config.paint(&level, level_color));
    line.push_str(&config.paint(&process_thread_block(event, config), config.process_thread_color));
    line.push_str(&config.paint(&location_block(event, config), config.file_color));
    line.push_str(&config.paint(&event.message(), level_color));

    for trailer in [&event.exc_text, &event.stack_info].into_iter().flatten() {
        if !line.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(trailer);
    }
    line
}

/// `tracing_subscriber` layer printing every event as a [`render`]ed line.
pub struct ConsoleLayer<W = fn() -> std::io::Stderr> {
    config: DisplayConfig,
    min_level: Level,
    make_writer: W,
}

impl ConsoleLayer {
    /// Console layer writing to standard error.
    pub fn new(config: DisplayConfig) -> Self {
        ConsoleLayer {
            config,
            min_level: Level::NOTSET,
            make_writer: std::io::stderr,
        }
    }
}

impl<W> ConsoleLayer<W> {
    pub fn with_writer<W2>(self, make_writer: W2) -> ConsoleLayer<W2>
    where
        W2: for<'a> MakeWriter<'a> + 'static,
    {
        ConsoleLayer {
            config: self.config,
            min_level: self.min_level,
            make_writer,
        }
    }

    pub fn with_min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }
}

impl<S, W> Layer<S> for ConsoleLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if Level::from(event.metadata().level()) < self.min_level {
            return;
        }
        let mut line = render(&capture(event), &self.config);
        line.push('\n');
        let _ = self.make_writer.make_writer().write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};

    fn event(level: Level) -> LogEvent {
        LogEvent::new("orders", level, "order {} shipped")
            .with_args(vec![42])
            .with_location("src/orders/ship.rs", 17, "orders::ship")
            .with_function("ship")
            .created_at(Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap())
    }

    fn config() -> DisplayConfig {
        DisplayConfig {
            datetime: Timestamper::new(TimeZone::Utc, DEFAULT_CONSOLE_FORMAT),
            ..DisplayConfig::plain()
        }
    }

    #[test]
    fn default_segments() {
        assert_eq!(
            render(&event(Level::INFO), &config()),
            "2024-02-03 04:05:06 INFO     [ orders - ship.rs:17 - ship() ] order 42 shipped"
        );
    }

    #[test]
    fn hidden_level_leaves_no_artifact() {
        let cfg = DisplayConfig { show_level: false, ..config() };
        let line = render(&event(Level::ERROR), &cfg);
        assert_eq!(line, "2024-02-03 04:05:06 [ orders - ship.rs:17 - ship() ] order 42 shipped");
        assert!(!line.contains("ERROR"));
    }

    #[test]
    fn everything_hidden_is_just_the_message() {
        let cfg = DisplayConfig {
            show_datetime: false,
            show_level: false,
            show_logger_name: false,
            show_file: false,
            show_line: false,
            show_func: false,
            ..config()
        };
        assert_eq!(render(&event(Level::INFO), &cfg), "order 42 shipped");
    }

    #[test]
    fn process_and_thread_block() {
        let mut e = event(Level::WARNING);
        e.process.name = "svc".into();
        e.process.id = 100;
        e.thread.name = "main".into();
        e.thread.id = 1;

        let cfg = DisplayConfig {
            show_datetime: false,
            show_process_name: true,
            show_process_id: true,
            show_thread_id: true,
            show_logger_name: false,
            show_func: false,
            ..config()
        };
        assert_eq!(
            render(&e, &cfg),
            "WARNING  [ svc:100 - 1 ] [ ship.rs:17 ] order 42 shipped"
        );
    }

    #[test]
    fn file_depth_and_function_fallback() {
        let mut e = event(Level::DEBUG);
        e.func_name = None;
        let cfg = DisplayConfig { show_datetime: false, file_depth: 2, ..config() };
        assert_eq!(
            render(&e, &cfg),
            "DEBUG    [ orders - orders/ship.rs:17 - orders::ship() ] order 42 shipped"
        );

        assert_eq!(truncate_path("a/b/c.rs", 0), "a/b/c.rs");
        assert_eq!(truncate_path(r"a\b\c.rs", 5), "a/b/c.rs");
    }

    #[test]
    fn unknown_level_uses_fallback_label() {
        let cfg = DisplayConfig { show_datetime: false, show_logger_name: false, show_file: false, show_line: false, show_func: false, ..config() };
        assert_eq!(render(&event(Level::from_number(25)), &cfg), "order 42 shipped");
        assert_eq!(level_style(Level::from_number(25)), ("", Color::Yellow));

        let cfg = DisplayConfig { colorful: true, ..cfg };
        assert_eq!(
            render(&event(Level::from_number(25)), &cfg),
            "order 42 shipped".color(Color::Yellow).to_string()
        );
        assert_eq!(level_style(Level::CRITICAL), ("CRITICAL ", Color::BrightRed));
    }

    #[test]
    fn exception_and_stack_on_own_lines() {
        let e = event(Level::ERROR)
            .with_exception("Error: disk full\n")
            .with_stack("at ship (src/orders/ship.rs:17)");
        let cfg = DisplayConfig { show_datetime: false, show_level: false, show_logger_name: false, show_file: false, show_line: false, show_func: false, ..config() };
        assert_eq!(
            render(&e, &cfg),
            "order 42 shipped\nError: disk full\nat ship (src/orders/ship.rs:17)"
        );
    }

    #[test]
    fn missing_location_leaves_no_separator() {
        let e = LogEvent::new("orders", Level::INFO, "no source")
            .created_at(Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap());
        let cfg = DisplayConfig { show_datetime: false, ..config() };
        assert_eq!(render(&e, &cfg), "INFO     [ orders ] no source");

        let e = e.with_location("", 12, "orders::ship");
        assert_eq!(render(&e, &cfg), "INFO     [ orders - 12 - orders::ship() ] no source");
    }

    #[test]
    fn unrenderable_time_format_does_not_panic() {
        let cfg = DisplayConfig {
            datetime: Timestamper::new(TimeZone::Utc, "%Y-%Q"),
            show_level: false,
            show_logger_name: false,
            show_file: false,
            show_line: false,
            show_func: false,
            ..config()
        };
        assert_eq!(render(&event(Level::INFO), &cfg), "2024-02-03T04:05:06+00:00 order 42 shipped");
    }
}
