use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, for local development.
    Pretty,
    /// One flattened JSON object per event, for log shipping.
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. Fails if a global
/// subscriber has already been installed.
pub fn init_tracing(
    service_name: &str,
    log_level: &str,
    format: LogFormat,
) -> Result<(), anyhow::Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| {
        anyhow::anyhow!(
            "Failed to initialize tracing for service '{}': {}",
            service_name,
            e
        )
    })?;

    tracing::debug!(service = %service_name, ?format, "Tracing initialized");
    Ok(())
}
