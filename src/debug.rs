//! Debug logging switch.
//!
//! Verbose bus diagnostics are only emitted when the `BUS_DEBUG`
//! environment variable is set to `y`. The variable is read once per process.

use std::sync::OnceLock;

/// Environment variable that enables verbose bus logging.
pub const DEBUG_ENV_VAR: &str = "BUS_DEBUG";

static ENABLED: OnceLock<bool> = OnceLock::new();

/// Whether verbose bus logging is enabled.
pub fn enabled() -> bool {
    *ENABLED.get_or_init(|| flag_set(std::env::var(DEBUG_ENV_VAR).ok().as_deref()))
}

fn flag_set(value: Option<&str>) -> bool {
    value == Some("y")
}

/// Emit a `tracing::debug!` event under the `bus` target when `BUS_DEBUG=y`.
macro_rules! bus_debug {
    ($($arg:tt)+) => {
        if $crate::debug::enabled() {
            ::tracing::debug!(target: "bus", $($arg)+);
        }
    };
}

pub(crate) use bus_debug;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_only_accepts_y() {
        assert!(flag_set(Some("y")));
        assert!(!flag_set(Some("yes")));
        assert!(!flag_set(Some("1")));
        assert!(!flag_set(Some("")));
        assert!(!flag_set(None));
    }
}
