use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Target used for the "message opened" event so it can be filtered or
// shipped separately from request logs.
pub const OPENS_TARGET: &str = "mail_beacon::opens";

// Install the global subscriber. RUST_LOG takes precedence over level.
// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http=info")));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true));

    let _ = subscriber.try_init();
}
