//! TOML configuration with embedded defaults
//!
//! Sections: `[ledger]`, `[withdrawal]`, `[reader]`, `[logging]`. Load with
//! `load_config_from_path`, validate, then pass the value to constructors.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{load_config_from_path, parse_config, CONFIG_FILE_PATH};
