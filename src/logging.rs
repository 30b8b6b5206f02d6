//! Tracing initialization

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ENV_LOG;

static INIT: Once = Once::new();

/// Initialize the tracing subscriber, logging to stderr
///
/// `GROUNDQA_LOG` takes precedence (e.g. `GROUNDQA_LOG=groundqa=debug`);
/// otherwise `default_directive` is used. Later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(ENV_LOG)
            .or_else(|_| EnvFilter::try_new(default_directive))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            )
            .with(filter)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing("not a valid directive [");
        init_tracing("debug");
        tracing::info!("still logging");
    }
}
