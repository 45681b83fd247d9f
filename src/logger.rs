use anyhow::Result;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Logs always go to a daily rolling file under `log_dir` because the TUI owns the
/// terminal. `verbose` adds a stderr layer, which is only sensible for one-shot commands.
pub fn init_logger(log_dir: &Path, verbose: bool) -> Result<()> {
    let log_level =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,chatwidget=info".to_string());
    let filter = EnvFilter::try_new(&log_level)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("chatwidget")
        .filename_suffix("log")
        .build(log_dir)?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}
