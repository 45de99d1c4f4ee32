// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{
    Args, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{BufWriter, Write},
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::{ParseError, Targets},
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable used to filter log output, in `tracing_subscriber` targets syntax.
pub(crate) const LOG_ENV: &str = "RISKSHARD_LOG";

/// Log events with this target are printed without an `error:`/`info:` heading.
pub(crate) const NO_HEADING_TARGET: &str = "riskshard::no_heading";

/// Help and usage styles for clap.
pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .error(AnsiColor::Red.on_default().effects(Effects::BOLD));

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Also print mapping confidence and the reasons behind each risk score
    #[arg(long, short, global = true, env = "RISKSHARD_VERBOSE")]
    pub(crate) verbose: bool,

    /// When to color output [possible values: auto, always, never]
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "RISKSHARD_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        init_logging(self.color.should_colorize(supports_color::Stream::Stderr));
        OutputContext {
            verbose: self.verbose,
            color: self.color,
        }
    }
}

/// Output settings for a single invocation.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns styles for error output on stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        StderrStyles::new(self.color.should_colorize(supports_color::Stream::Stderr))
    }

    /// Returns styles for human-readable output on stdout.
    pub(crate) fn stdout_styles(&self) -> StdoutStyles {
        StdoutStyles::new(self.color.should_colorize(supports_color::Stream::Stdout))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Installs the stderr logger. Only the first call has any effect.
fn init_logging(colorize: bool) {
    INIT_LOGGER.call_once(|| {
        let log_value = std::env::var(LOG_ENV).ok();
        let (targets, parse_error) = log_targets(log_value.as_deref());

        let layer = tracing_subscriber::fmt::layer()
            .event_format(HeadingFormatter { colorize })
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();

        if let (Some(value), Some(error)) = (log_value, parse_error) {
            tracing::warn!("ignoring invalid {LOG_ENV} value `{value}`: {error}");
        }
    });
}

/// Parses a `RISKSHARD_LOG` value, falling back to `info` when it is unset, empty or invalid.
fn log_targets(value: Option<&str>) -> (Targets, Option<ParseError>) {
    let fallback = || Targets::new().with_default(LevelFilter::INFO);
    match value.filter(|value| !value.is_empty()) {
        None => (fallback(), None),
        Some(value) => match value.parse::<Targets>() {
            Ok(targets) => (targets, None),
            Err(error) => (fallback(), Some(error)),
        },
    }
}

/// Prints the message of each event, prefixed by a styled level heading.
struct HeadingFormatter {
    colorize: bool,
}

impl HeadingFormatter {
    fn heading(&self, level: Level) -> (&'static str, Style) {
        let (name, colored) = match level {
            Level::ERROR => ("error", style().red().bold()),
            Level::WARN => ("warning", style().yellow().bold()),
            Level::INFO => ("info", style().bold()),
            Level::DEBUG => ("debug", style().bold()),
            Level::TRACE => ("trace", style().dimmed()),
        };
        (name, if self.colorize { colored } else { Style::new() })
    }
}

impl<S, N> FormatEvent<S, N> for HeadingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let (name, heading_style) = self.heading(*metadata.level());
            write!(writer, "{}: ", name.style(heading_style))?;
        }

        let mut message = MessageField::default();
        event.record(&mut message);
        writeln!(writer, "{}", message.0)
    }
}

/// Collects the `message` field of an event. Structured fields are not printed.
#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Styles for error output on stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

impl StderrStyles {
    fn new(colorize: bool) -> Self {
        if colorize {
            Self {
                bold: style().bold(),
            }
        } else {
            Self::default()
        }
    }
}

/// Styles for map, plan and combine summaries on stdout.
#[derive(Debug, Default)]
pub(crate) struct StdoutStyles {
    pub(crate) bold: Style,
    pub(crate) path: Style,
    pub(crate) score: Style,
    pub(crate) pass: Style,
    pub(crate) fail: Style,
    pub(crate) skip: Style,
}

impl StdoutStyles {
    fn new(colorize: bool) -> Self {
        if !colorize {
            return Self::default();
        }
        Self {
            bold: style().bold(),
            path: style().cyan(),
            score: style().magenta().bold(),
            pass: style().green().bold(),
            fail: style().red().bold(),
            skip: style().yellow().bold(),
        }
    }
}

/// Where command output goes: the real stdout, or a buffer in tests.
#[derive(Default)]
pub enum OutputWriter {
    /// Write to stdout.
    #[default]
    Normal,
    /// Capture output in memory.
    #[cfg(test)]
    Test {
        /// Captured stdout.
        stdout: Vec<u8>,
    },
}

impl OutputWriter {
    /// Returns a buffered writer for command output.
    pub(crate) fn stdout_writer(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(std::io::stdout())),
            #[cfg(test)]
            Self::Test { stdout } => Box::new(stdout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_targets_fallback() {
        for value in [None, Some("")] {
            let (targets, error) = log_targets(value);
            assert_eq!(targets.default_level(), Some(LevelFilter::INFO), "{value:?}");
            assert!(error.is_none(), "{value:?}");
        }

        let (targets, error) = log_targets(Some("debug"));
        assert_eq!(targets.default_level(), Some(LevelFilter::DEBUG));
        assert!(error.is_none());

        let (targets, error) = log_targets(Some("riskshard=loud"));
        assert_eq!(targets.default_level(), Some(LevelFilter::INFO));
        assert!(error.is_some(), "invalid level is reported");
    }

    #[test]
    fn headings_respect_color() {
        let plain = HeadingFormatter { colorize: false };
        assert_eq!(plain.heading(Level::WARN), ("warning", Style::new()));

        let colored = HeadingFormatter { colorize: true };
        let (name, heading_style) = colored.heading(Level::ERROR);
        assert_eq!(name, "error");
        assert_eq!(
            format!("{}", name.style(heading_style)),
            format!("{}", "error".red().bold())
        );
    }

    #[test]
    fn test_writer_captures_output() {
        let mut output = OutputWriter::Test { stdout: Vec::new() };
        {
            let mut writer = output.stdout_writer();
            writeln!(writer, "tests/test_auth.py").unwrap();
            writer.flush().unwrap();
        }
        let OutputWriter::Test { stdout } = output else {
            unreachable!("writer is always a test writer")
        };
        assert_eq!(stdout, b"tests/test_auth.py\n");
        assert_eq!(StdoutStyles::new(false).pass, Style::new());
    }
}
