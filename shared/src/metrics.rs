use metrics_exporter_statsd::{StatsdBuilder, StatsdError};

const QUEUE_SIZE: usize = 5000;
const BUFFER_SIZE: usize = 1024;

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Installs a statsd recorder as the global `metrics` recorder.
///
/// Without a call to this function every metric macro is a no-op, which is
/// what tests and the one-shot CLI mode rely on.
pub fn init_statsd(host: &str, port: u16, prefix: &str) -> Result<(), MetricsError> {
    let recorder = StatsdBuilder::from(host, port)
        .with_queue_size(QUEUE_SIZE)
        .with_buffer_size(BUFFER_SIZE)
        .build(Some(prefix))?;

    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;
    tracing::info!(host, port, prefix, "statsd metrics recorder installed");
    Ok(())
}
