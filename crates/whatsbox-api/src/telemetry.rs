//! Tracing initialization.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use whatsbox_core::Config;

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level; `LOG_FORMAT=json` selects structured output; `LOG_OUTPUT=file`
/// writes daily-rolled files under `LOG_FILE_PATH` instead of stdout.
///
/// The returned guard must be held for the process lifetime: dropping it
/// stops the non-blocking file writer and loses buffered lines.
pub fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>, anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "whatsbox={level},whatsbox_api={level},whatsbox_db={level},whatsbox_wa={level},tower_http=info",
            level = config.log_level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);
    let json = config.log_format == "json";

    let guard = if config.log_output == "file" {
        let path = Path::new(&config.log_file_path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("whatsbox.log");
        let dir = dir.unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
            dir, file_name,
        ));
        if json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .try_init()
                .map_err(|err| anyhow::anyhow!("failed to init logging: {err}"))?;
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|err| anyhow::anyhow!("failed to init logging: {err}"))?;
        }
        Some(guard)
    } else {
        if json {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|err| anyhow::anyhow!("failed to init logging: {err}"))?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .map_err(|err| anyhow::anyhow!("failed to init logging: {err}"))?;
        }
        None
    };

    Ok(guard)
}
