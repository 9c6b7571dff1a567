use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "BLANK_SLATE_LOG";
const DEFAULT_FILTER: &str = "blank_slate_ubi=info";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
