//! Utilities for logging.

use std::str::FromStr;

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" | "human_readable" => Ok(LogFormat::HumanReadable),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Build the env filter, falling back to `default_level` if `RUST_LOG` isn't
/// set.
fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(Directive::from(default_level))
        .from_env_lossy()
}

/// Try to configure the global logger. Errors if a global subscriber is
/// already set.
pub fn try_configure_global_logger<W>(
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> Result<(), SetGlobalDefaultError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer);

    match format {
        LogFormat::HumanReadable => {
            let subscriber = builder.with_target(false).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = builder.json().with_current_span(false).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}

/// Configure the global logger, ignoring an already set subscriber.
pub fn configure_global_logger<W>(default_level: Level, format: LogFormat, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let _ = try_configure_global_logger(default_level, format, writer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_format() {
        assert_eq!(LogFormat::Json, "json".parse().unwrap());
        assert_eq!(LogFormat::HumanReadable, "human".parse().unwrap());
        "xml".parse::<LogFormat>().unwrap_err();
    }

    #[test]
    fn second_configure_errors() {
        configure_global_logger(Level::WARN, LogFormat::HumanReadable, std::io::sink);
        try_configure_global_logger(Level::WARN, LogFormat::Json, std::io::sink).unwrap_err();
    }
}
