//! Tracing subscriber setup.
//!
//! Events go to stderr so reports and plots on stdout stay clean.
//! `RUST_LOG` wins when set; otherwise `-v`/`-q` adjust the default `info` level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map `-v` count and `-q` to a default level.
pub fn default_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::WARN;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global fmt subscriber (no-op if one is already set).
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbose, quiet).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_level(0, false), LevelFilter::INFO);
        assert_eq!(default_level(1, false), LevelFilter::DEBUG);
        assert_eq!(default_level(3, false), LevelFilter::TRACE);
        assert_eq!(default_level(2, true), LevelFilter::WARN);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(0, true);
        init(1, false);
    }
}
