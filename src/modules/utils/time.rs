use chrono::{DateTime, Utc};

/// Format a unix timestamp as a readable UTC date
pub fn format_timestamp(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Current unix timestamp in seconds
pub fn get_current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Format a TTL in seconds for humans (mail bodies, startup logs)
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{} seconds", seconds)
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours", seconds / 3600)
    } else {
        format!("{} days", seconds / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formatting() {
        // 2021-01-01 00:00:00 UTC
        assert_eq!(format_timestamp(1609459200), "2021-01-01 00:00:00");
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        let timestamp = get_current_timestamp();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(now.abs_diff(timestamp) < 60);
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(30), "30 seconds");
        assert_eq!(format_duration(900), "15 minutes");
        assert_eq!(format_duration(3600), "1 hours");
        assert_eq!(format_duration(86400), "1 days");
    }
}
