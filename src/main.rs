/// liqconverge - drive a liquidity position down to a target
///
/// Usage:
/// liqconverge show --pool 3 --owner 0xabc
/// liqconverge decrease --pool 3 --owner 0xabc --target 250000000
/// liqconverge decrease-pct --pool 3 --owner 0xabc --percentage 40
/// liqconverge exit --pool 3 --owner 0xabc --max-slippage-bps 80
/// liqconverge simulate --liquidity 1000000000 --efficiency-bps 9000 --gas-floor 5
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use liquidity_converge::{
    config::{load_config_from_path, Config, WithdrawalConfig, CONFIG_FILE_PATH},
    errors::ControllerError,
    ledger::{
        types::{Liquidity, OwnerId, PoolId},
        KeystoreSigners, LedgerReader, LedgerWriter, RpcLedger, SignerResolver, SimulatedLedger,
    },
    logger::{self, LogLevel, LogTag, LoggerConfig},
    shutdown::install_ctrlc_handler,
    withdrawal::{
        ConvergenceController, DecreaseOutcome, DecreaseRequest, LoopLimits, PositionStateReader,
        ReadRetryPolicy, WithdrawalExecutor, WithdrawalGoal,
    },
};

#[derive(Parser, Debug)]
#[command(name = "liqconverge", version)]
#[command(about = "Withdraw liquidity in percentage steps until a target is reached")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Show verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable debug output for a tag (ledger, reader, executor, controller, all)
    #[arg(long = "debug", global = true, value_name = "TAG")]
    debug: Vec<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PositionArgs {
    /// Pool identifier
    #[arg(long)]
    pool: u64,

    /// Position owner address
    #[arg(long)]
    owner: String,
}

/// Per-run overrides of the `[withdrawal]` section
#[derive(Args, Debug)]
struct LimitArgs {
    #[arg(long)]
    max_slippage_bps: Option<u16>,

    #[arg(long)]
    gas_floor: Option<u64>,

    #[arg(long)]
    max_iterations: Option<u32>,

    /// Overall deadline in seconds (0 = none)
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl LimitArgs {
    fn resolve(&self, defaults: &WithdrawalConfig) -> LoopLimits {
        let mut config = defaults.clone();
        if let Some(value) = self.max_slippage_bps {
            config.max_slippage_bps = value;
        }
        if let Some(value) = self.gas_floor {
            config.gas_floor = value;
        }
        if let Some(value) = self.max_iterations {
            config.max_iterations = value;
        }
        if let Some(value) = self.deadline_secs {
            config.deadline_secs = value;
        }
        LoopLimits::from_config(&config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current position
    Show {
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Decrease liquidity to at or below a target
    Decrease {
        #[command(flatten)]
        position: PositionArgs,

        #[arg(long)]
        target: Liquidity,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Remove a percentage of the current liquidity
    DecreasePct {
        #[command(flatten)]
        position: PositionArgs,

        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        percentage: u8,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Withdraw the whole position
    Exit {
        #[command(flatten)]
        position: PositionArgs,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Run the controller against an in-memory ledger
    Simulate {
        /// Initial liquidity of the simulated position
        #[arg(long)]
        liquidity: Liquidity,

        #[arg(long, default_value_t = 0)]
        target: Liquidity,

        /// Share of each requested withdrawal actually removed (10000 = exact)
        #[arg(long, default_value_t = 10_000)]
        efficiency_bps: u32,

        /// Price impact realized by every withdrawal
        #[arg(long, default_value_t = 0)]
        price_impact_bps: u16,

        /// Confirmation latency per withdrawal in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            logger::error(LogTag::System, &format!("❌ {:#}", e));
            1
        }
    };

    logger::flush();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config_from_path(&cli.config).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    logger::init(logger_config(&config, &cli)?);

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone()).context("Failed to install Ctrl+C handler")?;

    match cli.command {
        Command::Show { position } => {
            let ledger = Arc::new(rpc_ledger(&config)?);
            let reader = PositionStateReader::new(ledger, ReadRetryPolicy::from_config(&config.reader));
            let owner = OwnerId::new(position.owner);
            let pool = PoolId(position.pool);
            let snapshot = reader
                .read(&owner, pool)
                .await
                .with_context(|| format!("Failed to read position {} in pool {}", owner, pool))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else if snapshot.exists() {
                let token = snapshot
                    .token_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} pool {}: liquidity {} (token {})",
                    owner,
                    pool,
                    snapshot.liquidity.to_string().bold(),
                    token
                );
            } else {
                println!("{} has no position in pool {}", owner, pool);
            }
            Ok(())
        }
        Command::Decrease {
            position,
            target,
            limits,
        } => {
            let request = request(position, WithdrawalGoal::Target(target), &limits, &config);
            run_on_rpc(&config, &request, &cancel, cli.json).await
        }
        Command::DecreasePct {
            position,
            percentage,
            limits,
        } => {
            let request = request(position, WithdrawalGoal::Percentage(percentage), &limits, &config);
            run_on_rpc(&config, &request, &cancel, cli.json).await
        }
        Command::Exit { position, limits } => {
            let request = request(position, WithdrawalGoal::FullExit, &limits, &config);
            run_on_rpc(&config, &request, &cancel, cli.json).await
        }
        Command::Simulate {
            liquidity,
            target,
            efficiency_bps,
            price_impact_bps,
            latency_ms,
            limits,
        } => {
            let ledger = Arc::new(
                SimulatedLedger::new()
                    .with_efficiency_bps(efficiency_bps)
                    .with_price_impact_bps(price_impact_bps)
                    .with_confirmation_latency(Duration::from_millis(latency_ms)),
            );
            let owner = OwnerId::from("simulated");
            ledger.open_position(&owner, PoolId(0), liquidity);
            logger::info(
                LogTag::Cli,
                &format!(
                    "🧪 Simulating {} -> {} at {} bps efficiency",
                    liquidity, target, efficiency_bps
                ),
            );

            let request = DecreaseRequest::new(
                PoolId(0),
                owner,
                WithdrawalGoal::Target(target),
                limits.resolve(&config.withdrawal),
            );
            let controller = controller(ledger.clone(), ledger.clone(), ledger, &config);
            report(controller.run(&request, &cancel).await, cli.json)
        }
    }
}

fn logger_config(config: &Config, cli: &Cli) -> Result<LoggerConfig> {
    let mut min_level: LogLevel = config
        .logging
        .min_level
        .parse()
        .map_err(anyhow::Error::msg)?;
    if cli.verbose {
        min_level = LogLevel::Verbose;
    }

    let debug_tags: HashSet<String> = config
        .logging
        .debug_tags
        .iter()
        .chain(cli.debug.iter())
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();

    Ok(LoggerConfig {
        min_level,
        debug_tags,
        file_path: config.logging.file_path.as_deref().map(PathBuf::from),
        plain: false,
    })
}

fn request(
    position: PositionArgs,
    goal: WithdrawalGoal,
    limits: &LimitArgs,
    config: &Config,
) -> DecreaseRequest {
    DecreaseRequest::new(
        PoolId(position.pool),
        OwnerId::new(position.owner),
        goal,
        limits.resolve(&config.withdrawal),
    )
}

fn rpc_ledger(config: &Config) -> Result<RpcLedger> {
    config
        .validate_for_rpc()
        .context("The RPC ledger needs [ledger] settings")?;
    Ok(RpcLedger::new(
        config.ledger.rpc_url.clone(),
        config.ledger.contract_address.clone(),
        Duration::from_secs(config.ledger.request_timeout_secs),
        Duration::from_secs(config.ledger.confirmation_timeout_secs),
    ))
}

fn controller(
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn LedgerWriter>,
    signers: Arc<dyn SignerResolver>,
    config: &Config,
) -> ConvergenceController {
    ConvergenceController::new(
        PositionStateReader::new(reader, ReadRetryPolicy::from_config(&config.reader)),
        WithdrawalExecutor::new(
            writer,
            signers,
            Duration::from_secs(config.ledger.confirmation_timeout_secs),
        ),
    )
}

async fn run_on_rpc(
    config: &Config,
    request: &DecreaseRequest,
    cancel: &CancellationToken,
    json: bool,
) -> Result<()> {
    let ledger = Arc::new(rpc_ledger(config)?);
    let signers = Arc::new(KeystoreSigners::from_config(&config.ledger.signers));
    if signers.is_empty() {
        logger::warning(LogTag::Cli, "⚠️ No signers configured under [ledger.signers]");
    }
    logger::info(
        LogTag::Cli,
        &format!("📡 Using contract {} via {}", ledger.contract_address(), config.ledger.rpc_url),
    );

    let controller = controller(ledger.clone(), ledger, signers, config);
    report(controller.run(request, cancel).await, json)
}

fn report(result: Result<DecreaseOutcome, ControllerError>, json: bool) -> Result<()> {
    match result {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }
            println!(
                "{} {} -> {} (target {}) in {} iterations",
                outcome.outcome.to_string().green().bold(),
                outcome.initial_liquidity(),
                outcome.final_liquidity.to_string().bold(),
                outcome.target_liquidity,
                outcome.iterations_used
            );
            for receipt in &outcome.receipts {
                println!(
                    "  {}% tx {} block {} at {}",
                    receipt.percentage,
                    receipt.tx_id.dimmed(),
                    receipt.block_number,
                    receipt.confirmed_at.format("%H:%M:%S")
                );
            }
            Ok(())
        }
        Err(error) => {
            if json {
                let body = serde_json::json!({
                    "error": error.to_string(),
                    "iterations_used": error.iterations_used(),
                    "last_remaining": error.last_remaining().map(|v| v.to_string()),
                    "may_have_progressed": error.may_have_progressed(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else if error.may_have_progressed() {
                println!(
                    "{}",
                    "Position may have changed; re-read it before retrying".yellow()
                );
            }
            Err(error.into())
        }
    }
}
