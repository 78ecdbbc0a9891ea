use nlog::{configure, NLogConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log = configure(&NLogConfig {
        output_console: true,
        output_file: false,
        ..NLogConfig::default()
    });
    log.init()?;

    tracing::trace!("This is a trace message");
    tracing::debug!(cache_hits = 12, "This is a debug message");
    tracing::info!("This is an info message");
    tracing::warn!(retry_in_ms = 250, "This is a warning message");
    tracing::error!("This is an error message");

    Ok(())
}
