use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target used for the operator-facing status trail.
pub const STATUS_TARGET: &str = "ccc.status";

static STATUS_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install stderr logging (and the optional rolling status log). Stdout is left to the
/// host for rendered output. `RUST_LOG` wins over `default_filter`. Safe to call twice.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(fmt_layer.with_filter(filter));
    match status_log_writer() {
        Some(nb) => {
            let _ = registry.with(status_layer(nb)).try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}

fn status_layer<S>(
    nb: tracing_appender::non_blocking::NonBlocking,
) -> impl Layer<S> + Send + Sync + 'static
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let targets = Targets::new().with_target(STATUS_TARGET, tracing::Level::INFO);
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(nb)
        .with_filter(targets)
}

fn status_log_writer() -> Option<tracing_appender::non_blocking::NonBlocking> {
    if std::env::var("CCC_LOG_ROLL").ok().as_deref() != Some("1") {
        return None;
    }
    let dir = std::env::var("CCC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let prefix = std::env::var("CCC_LOG_PREFIX").unwrap_or_else(|_| "ccc-status".into());
    let rotation = std::env::var("CCC_LOG_ROTATION").unwrap_or_else(|_| "daily".into());
    if std::fs::create_dir_all(&dir).is_err() {
        eprintln!("failed to create status log directory {dir}");
        return None;
    }
    let writer = match rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::hourly(&dir, &prefix),
        "minutely" => tracing_appender::rolling::minutely(&dir, &prefix),
        _ => tracing_appender::rolling::daily(&dir, &prefix),
    };
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let _ = STATUS_GUARD.set(guard);
    Some(nb)
}
