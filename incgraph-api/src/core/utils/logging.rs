use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Build the log filter, `RUST_LOG` wins over the configured level.
pub fn get_log_env(log_level: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install a global fmt subscriber at the given level. Later calls are no-ops.
pub fn init_global_logger(log_level: String) {
    INIT.call_once(|| {
        let filter = get_log_env(log_level);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_thread_names(true))
            .try_init();
    });
}

pub fn global_info_logger() {
    init_global_logger("INFO".to_string())
}
