/*!
Logging setup for the geostitch binary.

Logs go to stderr so that stdout stays free for the output document. `RUST_LOG` wins
over the verbosity flag when it is set. With the `profiling` feature, a tracing-chrome
layer additionally records every profiled scope into a trace file that can be opened
in Perfetto.
*/

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Keeps the trace file open until dropped
pub struct LoggingGuard {
    #[cfg(feature = "profiling")]
    _chrome: tracing_chrome::FlushGuard,
}

/// Default filter for a `-v` count
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber
#[cfg(not(feature = "profiling"))]
pub fn setup_logging(verbose: u8) -> LoggingGuard {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(verbose));
    tracing_subscriber::registry().with(fmt_layer).init();
    LoggingGuard {}
}

/// Install the global subscriber with a chrome trace layer
#[cfg(feature = "profiling")]
pub fn setup_logging(verbose: u8) -> LoggingGuard {
    let trace_file = std::env::temp_dir().join(format!(
        "geostitch-trace-{}.json",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    ));
    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file(&trace_file)
        .include_args(true)
        .build();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(verbose));
    tracing_subscriber::registry()
        .with(chrome_layer)
        .with(fmt_layer)
        .init();
    tracing::info!("Recording profiling trace to {}", trace_file.display());
    LoggingGuard { _chrome: guard }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(5), "trace");
    }
}
