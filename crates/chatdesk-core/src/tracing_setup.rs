use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_tracing() {
    init_tracing_with_filter("info");
}

/// Install the global subscriber. `CHATDESK_LOG` overrides `default_filter`.
/// When `CHATDESK_LOG_FILE` is set, debug output is also appended to that file.
pub fn init_tracing_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_env("CHATDESK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_layer = std::env::var("CHATDESK_LOG_FILE").ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                eprintln!("File logging enabled: {}", log_path);
                Some(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
                )
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    // try_init: a second call (tests, embedding shells) must not panic
    let _ = registry.with(file_layer).try_init();
}
