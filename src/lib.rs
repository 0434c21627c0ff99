pub mod config;
pub mod errors;
pub mod ledger;
pub mod logger;
pub mod shutdown;
pub mod withdrawal;
