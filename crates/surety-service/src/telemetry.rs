/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "surety_service=info,info";

/// Install the global fmt subscriber.
///
/// Safe to call more than once; returns `false` when a subscriber was already
/// installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        )
        .try_init()
        .is_ok()
}
