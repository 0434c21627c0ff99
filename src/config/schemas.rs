/// Configuration schemas - every section declared once with its defaults
use std::collections::HashMap;

use crate::config_struct;

// ============================================================================
// LEDGER CONFIGURATION
// ============================================================================

config_struct! {
    /// Position gateway and strategy contract
    pub struct LedgerConfig {
        /// JSON-RPC endpoint of the position gateway
        rpc_url: String = "http://127.0.0.1:8545".to_string(),

        /// Strategy contract holding the positions (required for the RPC ledger)
        contract_address: String = String::new(),

        /// Timeout for read calls (seconds)
        request_timeout_secs: u64 = 30,

        /// How long to wait for a withdrawal to reach finality (seconds)
        confirmation_timeout_secs: u64 = 180,

        /// Owner address -> signing key reference
        signers: HashMap<String, String> = HashMap::new(),
    }
}

// ============================================================================
// WITHDRAWAL CONFIGURATION
// ============================================================================

config_struct! {
    /// Defaults for convergence runs; CLI flags override per run
    pub struct WithdrawalConfig {
        /// Maximum accepted price movement per instruction (basis points)
        max_slippage_bps: u16 = 50,

        /// Liquidity below which another instruction is not worth its gas
        gas_floor: u64 = 2_074_000,

        /// Instruction budget per run
        max_iterations: u32 = 10,

        /// Overall deadline per run in seconds (0 = none)
        deadline_secs: u64 = 0,
    }
}

// ============================================================================
// READER CONFIGURATION
// ============================================================================

config_struct! {
    /// Bounded retry for position reads, separate from the iteration budget
    pub struct ReaderConfig {
        retry_attempts: u32 = 3,
        retry_delay_ms: u64 = 500,
        read_timeout_secs: u64 = 30,
    }
}

// ============================================================================
// LOGGING CONFIGURATION
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        /// error | warning | info | debug | verbose
        min_level: String = "info".to_string(),

        /// Tags with debug output ("all" for everything)
        debug_tags: Vec<String> = Vec::new(),

        /// Optional log file (appended)
        file_path: Option<String> = None,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    pub struct Config {
        ledger: LedgerConfig = LedgerConfig::default(),
        withdrawal: WithdrawalConfig = WithdrawalConfig::default(),
        reader: ReaderConfig = ReaderConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}
