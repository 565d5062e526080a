//! Log output of the generated program.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Level used when `RUST_LOG` is unset.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install a stderr fmt subscriber honoring `RUST_LOG`.
pub fn init(verbose: bool) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
    }

    #[test]
    fn second_init_is_rejected() {
        let _ = init(false);
        assert!(init(false).is_err());
    }
}
