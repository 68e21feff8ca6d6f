//! `tracing` subscriber setup.
//!
//! The library only emits events; hosts that want them on stderr call
//! [`init`] once at startup.

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install tracing subscriber: {source}")]
    Install {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Builds the filter: `TIMELINE_SYNC_LOG` when set, otherwise `info`
/// (`debug` with `TIMELINE_SYNC_DEBUG=1`).
pub fn env_filter(config: &EnvConfig) -> Result<EnvFilter, LoggingError> {
    match &config.log_filter {
        Some(directive) => {
            EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
                directive: directive.clone(),
                source,
            })
        }
        None => Ok(EnvFilter::builder()
            .with_default_directive(default_level(config.debug).into())
            .parse_lossy("")),
    }
}

/// Installs a global fmt subscriber. Fails if one is already installed.
pub fn init(config: &EnvConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|source| LoggingError::Install { source })
}

fn default_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use timeline_protocol::TimelineProjection;
    use tracing::level_filters::LevelFilter;

    use super::{env_filter, LoggingError};
    use crate::config::EnvConfig;

    fn config(log_filter: Option<&str>, debug: bool) -> EnvConfig {
        EnvConfig {
            fetch_limit: 200,
            projection: TimelineProjection::Projected,
            log_filter: log_filter.map(str::to_string),
            debug,
        }
    }

    #[test]
    fn default_filter_follows_debug_flag() {
        let info = env_filter(&config(None, false)).expect("filter");
        assert_eq!(info.max_level_hint(), Some(LevelFilter::INFO));

        let debug = env_filter(&config(None, true)).expect("filter");
        assert_eq!(debug.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn explicit_directive_wins() {
        let filter = env_filter(&config(Some("timeline_sync=trace"), true)).expect("filter");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn malformed_directive_is_reported() {
        let error = env_filter(&config(Some("timeline_sync=loud"), false)).unwrap_err();
        assert_matches!(error, LoggingError::Filter { directive, .. } if directive == "timeline_sync=loud");
    }

    #[test]
    fn second_install_fails() {
        let config = config(Some("off"), false);
        let _ = super::init(&config);
        let second = super::init(&config);
        assert_matches!(second, Err(LoggingError::Install { .. }));
    }
}
