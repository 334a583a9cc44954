use env_logger::{Builder, Target, WriteStyle};
use log::{error, info, warn, LevelFilter};
use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;

/// Initialize the logging system.
///
/// Records go to `log_file` (appended) when one is configured, otherwise to
/// stderr. `RUST_LOG` overrides `level`.
pub fn initialize_logging(
    log_file: Option<&Path>,
    level: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = LevelFilter::from_str(level)?;

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(true)
        .write_style(WriteStyle::Auto);

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }
    builder.try_init()?;

    info!("Logging system initialized");
    Ok(())
}

/// Helper function to format sensitive data for logging
pub fn format_sensitive(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Structured logging for authentication events. Never pass a password or
/// hash in `details`.
pub fn log_auth_event(event_type: &str, username: &str, success: bool, details: Option<&str>) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Auth event: type={}, user={}, success=true, timestamp={}, details={:?}",
            event_type,
            format_sensitive(username),
            timestamp,
            details
        );
    } else {
        warn!(
            "Auth event: type={}, user={}, success=false, timestamp={}, details={:?}",
            event_type,
            format_sensitive(username),
            timestamp,
            details
        );
    }
}

/// Structured logging for store operations
pub fn log_data_operation(
    operation: &str,
    user: &str,
    backend: &str,
    success: bool,
    details: Option<&str>,
) {
    if success {
        info!(
            "Store operation: op={}, user={}, backend={}, success=true, details={:?}",
            operation,
            format_sensitive(user),
            backend,
            details
        );
    } else if details == Some("already exists") {
        warn!(
            "Store operation: op={}, user={}, backend={}, success=false, details={:?}",
            operation,
            format_sensitive(user),
            backend,
            details
        );
    } else {
        error!(
            "Store operation: op={}, user={}, backend={}, success=false, details={:?}",
            operation,
            format_sensitive(user),
            backend,
            details
        );
    }
}
