use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tapaal=debug,tower_http=info"));
    let fmt_layer = fmt::layer().with_target(false);

    if Registry::default().with(env_filter).with(fmt_layer).try_init().is_err() {
        tracing::warn!("tracing subscriber already installed");
    }
    tracing::info!("tracing initialized");
}
