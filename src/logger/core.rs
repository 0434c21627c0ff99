/// Core logging implementation with automatic filtering
use super::config::{get_logger_config, is_debug_enabled_for_tag, LoggerConfig};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug needs the tag opted in (or min level Verbose)
/// 3. Everything else is compared against the minimum level
pub fn should_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    if level == LogLevel::Debug {
        return config.min_level == LogLevel::Verbose || is_debug_enabled_for_tag(config, tag);
    }

    level <= config.min_level
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !should_log(&config, &tag, level) {
        return;
    }

    super::format::format_and_log(&tag, level, message, config.plain);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtering_rules() {
        let mut config = LoggerConfig::default();
        assert!(should_log(&config, &LogTag::Controller, LogLevel::Info));
        assert!(!should_log(&config, &LogTag::Controller, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Controller, LogLevel::Verbose));

        config.debug_tags.insert("controller".to_string());
        assert!(should_log(&config, &LogTag::Controller, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Ledger, LogLevel::Debug));

        config.min_level = LogLevel::Error;
        assert!(should_log(&config, &LogTag::Ledger, LogLevel::Error));
        assert!(!should_log(&config, &LogTag::Ledger, LogLevel::Warning));

        config.min_level = LogLevel::Verbose;
        assert!(should_log(&config, &LogTag::Ledger, LogLevel::Debug));
        assert!(should_log(&config, &LogTag::Ledger, LogLevel::Verbose));
    }
}
