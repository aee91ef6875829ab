use crate::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` is honoured unless `verbose` is set. `json` switches to
/// flattened JSON lines for log shippers.
pub fn init_logging(json: bool, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::new("keyed_producer=debug,rdkafka=info,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("keyed_producer=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialised: {}", e)))
}
