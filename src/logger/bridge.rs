/// `log` crate bridge so dependency records (reqwest, hyper) share our sink
use once_cell::sync::OnceCell;

use super::core::log_internal;
use super::levels::LogLevel;
use super::tags::LogTag;

struct LogBridge;

static BRIDGE: LogBridge = LogBridge;
static INSTALLED: OnceCell<()> = OnceCell::new();

impl log::Log for LogBridge {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let level = LogLevel::from(record.level());
        // Dependency info chatter is demoted; it only shows with --verbose
        let level = if level == LogLevel::Info { LogLevel::Verbose } else { level };
        log_internal(
            LogTag::Other(record.target().to_string()),
            level,
            &record.args().to_string(),
        );
    }

    fn flush(&self) {
        super::file::flush_file_logging();
    }
}

pub fn install() {
    INSTALLED.get_or_init(|| {
        if log::set_logger(&BRIDGE).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}
