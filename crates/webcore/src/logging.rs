use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Output format of log records on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

const DEFAULT_FILTER: &str = "warn";

/// Install the global tracing subscriber and route `log` records to it.
///
/// The filter is `level` when given, otherwise `RUST_LOG`, otherwise `warn`.
pub fn init(level: Option<&str>, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    tracing_log::LogTracer::init()?;
    Ok(())
}
