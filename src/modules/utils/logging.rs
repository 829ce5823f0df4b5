use env_logger::{Builder, Target, WriteStyle};
use log::{error, info, warn, LevelFilter};
use std::fs::OpenOptions;
use std::path::Path;

/// Initialize logging to stderr, or append to `log_file` when given.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn initialize_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(true)
        .write_style(WriteStyle::Auto);

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    info!("Logging system initialized");
    Ok(())
}

/// Mask an identifier so logs never carry it whole
pub fn format_sensitive(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Structured line for an authentication event (login, reset, verify...)
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

/// Structured line for a user store write
pub fn log_store_operation(operation: &str, user: &str, resource: &str, success: bool, details: Option<&str>) {
    if success {
        info!(
            "Store operation: op={}, user={}, resource={}, success=true, details={:?}",
            operation,
            format_sensitive(user),
            resource,
            details
        );
    } else {
        error!(
            "Store operation: op={}, user={}, resource={}, success=false, details={:?}",
            operation,
            format_sensitive(user),
            resource,
            details
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_data_formatting() {
        assert_eq!(format_sensitive("alice"), "al***ce");
        assert_eq!(format_sensitive("bob"), "***");
        assert_eq!(format_sensitive("longusername"), "lo***me");
        assert_eq!(format_sensitive(""), "");
        assert_eq!(format_sensitive("jérôme"), "jé***me");
    }

    #[test]
    fn test_logging_initialization_to_file() {
        let log_file = tempfile::NamedTempFile::new().unwrap();
        let result = initialize_logging(Some(log_file.path()));

        // Another test may already have installed the global logger
        assert!(
            result.is_ok()
                || result
                    .unwrap_err()
                    .to_string()
                    .contains("already")
        );
    }
}
