//! Logging and observability
//!
//! Structured logging for the orchestrator. Executors report each task outcome and a
//! stage summary through `tracing`; this module wires up the subscriber. Text or JSON
//! formatting is chosen at runtime through the CLI flag or environment variables.
//!
//! All logging output is directed to stderr to preserve stdout for command output.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable selecting the filter directives
pub const LOG_ENV: &str = "FXKIT_LOG";

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "FXKIT_LOG_FORMAT";

/// Initialize the logging system with an optional format specification
///
/// Subsequent calls are no-ops.
///
/// ## Arguments
///
/// * `format` - `None` or `"text"` for human-readable output, `"json"` for structured
///   output. Falls back to `FXKIT_LOG_FORMAT` when `None`.
///
/// ## Environment Variables
///
/// * `FXKIT_LOG_FORMAT` - Controls the log output format ("json" for JSON, any other value for text)
/// * `FXKIT_LOG` - Controls the logging filter level
/// * `RUST_LOG` - Standard Rust logging environment variable (used as fallback)
///
/// ## Example
///
/// ```rust
/// use fxkit_core::logging;
///
/// logging::init(None).expect("Failed to initialize logging");
/// ```
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_target(false).with_writer(io::stderr))
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

/// Create an EnvFilter based on environment variables
fn create_env_filter() -> EnvFilter {
    if let Ok(fx_log) = std::env::var(LOG_ENV) {
        EnvFilter::try_new(&fx_log).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid {} specification '{}', using default 'info'",
                LOG_ENV,
                fx_log
            );
            EnvFilter::new("info")
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

/// Render one task line of an executor summary
///
/// Produces `owner.task .......... [ok]` padded to a fixed column so summaries line
/// up regardless of plugin name length.
pub fn task_line(owner_id: &str, task_name: &str, ok: bool) -> String {
    format!(
        "{:.<60} {}",
        format!("{}.{}", owner_id, task_name),
        status_tag(ok)
    )
}

/// Render the header line of an executor summary
pub fn summary_header(step: &str) -> String {
    format!("{:-<64}", format!("[solution] Execute {}Task summary", step))
}

/// Render the overall result line of an executor summary
pub fn summary_result(step: &str, ok: bool) -> String {
    format!(
        "{:.<60}{}",
        format!("[solution] {}Task overall result", step),
        status_tag(ok)
    )
}

fn status_tag(ok: bool) -> &'static str {
    if ok {
        "[ok]"
    } else {
        "[failed]"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_init_multiple_calls_safe() {
        let _guard = TEST_MUTEX.lock().unwrap();

        assert!(init(None).is_ok());
        assert!(init(Some("json")).is_ok());
        assert!(init(Some("text")).is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_task_line_padding() {
        let line = task_line("fx-resource-bot", "provisionResource", true);
        assert!(line.starts_with("fx-resource-bot.provisionResource..."));
        assert!(line.ends_with(" [ok]"));
        assert_eq!(line.len(), 60 + 1 + "[ok]".len());

        let line = task_line("fx-resource-bot", "deploy", false);
        assert!(line.ends_with("[failed]"));
    }

    #[test]
    fn test_summary_lines() {
        let header = summary_header("post");
        assert!(header.starts_with("[solution] Execute postTask summary"));
        assert_eq!(header.len(), 64);

        let result = summary_result("pre", false);
        assert!(result.starts_with("[solution] preTask overall result"));
        assert!(result.ends_with("[failed]"));
    }
}
