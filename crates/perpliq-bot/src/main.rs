//! perpliq - liquidation keeper and admin CLI for the perpetuals program.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use perpliq_admin::QuorumOutcome;
use perpliq_core::instructions::{GetEntryPriceAndFeeParams, SetCustomOraclePriceParams};
use perpliq_core::{CustodyConfig, OracleParams, OracleType, Permissions, Side};
use perpliq_liquidator::ScannedPosition;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use tracing::info;

use perpliq_bot::{AppConfig, Application};

/// Liquidation keeper and admin CLI for the perpetuals program
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PERPLIQ_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// RPC URL, overrides the config file
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Signing keypair path, overrides the config file
    #[arg(short, long, global = true)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the liquidation daemon for one pool and token
    Run { pool_name: String, mint: Pubkey },
    /// Initialize the program; signed by the upgrade authority
    Init {
        /// Admin public keys
        #[arg(required = true, num_args = 1..)]
        admins: Vec<Pubkey>,
        #[arg(long)]
        min_signatures: u8,
        #[command(flatten)]
        permissions: PermissionArgs,
    },
    /// Create a pool
    AddPool { pool_name: String },
    /// Remove an empty pool
    RemovePool { pool_name: String },
    /// Add a custody for `mint` to a pool
    AddCustody {
        pool_name: String,
        mint: Pubkey,
        /// Price feed account
        oracle: Pubkey,
        #[arg(long, value_enum, default_value_t = OracleKind::Pyth)]
        oracle_type: OracleKind,
        /// Maximum price confidence interval, in BPS
        #[arg(long)]
        max_price_error: Option<u64>,
        #[arg(long)]
        max_price_age_sec: Option<u32>,
        #[arg(long)]
        stable: bool,
        #[arg(long = "virtual")]
        is_virtual: bool,
    },
    /// Remove the custody for `mint` from a pool
    RemoveCustody { pool_name: String, mint: Pubkey },
    /// Replace the admin signer set
    SetAuthority {
        #[arg(long, required = true, num_args = 1..)]
        admins: Vec<Pubkey>,
        #[arg(long)]
        min_signatures: u8,
    },
    /// Set global permissions
    SetPermissions(PermissionArgs),
    /// Write a custom oracle price for a custody
    SetOraclePrice {
        pool_name: String,
        mint: Pubkey,
        /// Current price as integer
        #[arg(long)]
        price: u64,
        #[arg(long, allow_negative_numbers = true)]
        exponent: i32,
        #[arg(long)]
        confidence: u64,
        /// EMA price as integer
        #[arg(long)]
        ema: u64,
    },
    /// Print a pool
    GetPool { pool_name: String },
    /// Print every pool
    GetPools,
    /// Print the custody for `mint` in a pool
    GetCustody { pool_name: String, mint: Pubkey },
    /// Print every custody of a pool
    GetCustodies { pool_name: String },
    /// List all positions in a pool
    GetPoolPositions { pool_name: String },
    /// List all positions of an owner
    GetUserPositions { owner: Pubkey },
    /// Ask the program whether a position can be liquidated
    GetLiquidationState { position: Pubkey },
    /// Compute the liquidation price of a position
    GetLiquidationPrice {
        position: Pubkey,
        #[arg(long, default_value_t = 0)]
        add_collateral: u64,
        #[arg(long, default_value_t = 0)]
        remove_collateral: u64,
    },
    /// Compute the PnL of a position
    GetPnl { position: Pubkey },
    /// Compute price and fee to open a position
    GetEntryPriceAndFee {
        pool_name: String,
        mint: Pubkey,
        collateral_mint: Pubkey,
        /// long or short
        side: Side,
        #[arg(long)]
        collateral: u64,
        #[arg(long)]
        size: u64,
    },
    /// Compute price and fee to close a position
    GetExitPriceAndFee { position: Pubkey },
    /// Read the oracle price the program uses for a token
    GetOraclePrice {
        pool_name: String,
        mint: Pubkey,
        #[arg(long)]
        ema: bool,
    },
    /// Compute assets under management of a pool
    GetAum { pool_name: String },
    /// Print the admin multisig account
    GetMultisig,
    /// Print the global perpetuals account
    GetPerpetuals,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OracleKind {
    None,
    Custom,
    Pyth,
}

impl From<OracleKind> for OracleType {
    fn from(kind: OracleKind) -> Self {
        match kind {
            OracleKind::None => OracleType::None,
            OracleKind::Custom => OracleType::Custom,
            OracleKind::Pyth => OracleType::Pyth,
        }
    }
}

#[derive(clap::Args, Debug)]
struct PermissionArgs {
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_swap: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_add_liquidity: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_remove_liquidity: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_open_position: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_close_position: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_pnl_withdrawal: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_collateral_withdrawal: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    allow_size_change: bool,
}

impl From<PermissionArgs> for Permissions {
    fn from(args: PermissionArgs) -> Self {
        Self {
            allow_swap: args.allow_swap,
            allow_add_liquidity: args.allow_add_liquidity,
            allow_remove_liquidity: args.allow_remove_liquidity,
            allow_open_position: args.allow_open_position,
            allow_close_position: args.allow_close_position,
            allow_pnl_withdrawal: args.allow_pnl_withdrawal,
            allow_collateral_withdrawal: args.allow_collateral_withdrawal,
            allow_size_change: args.allow_size_change,
        }
    }
}

fn print_positions(positions: &[ScannedPosition]) {
    for scanned in positions {
        println!("{}: {:#?}", scanned.address, scanned.position);
    }
    println!("{} position(s)", positions.len());
}

fn print_outcome(outcome: &QuorumOutcome) {
    for signature in &outcome.signatures {
        println!("{signature}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    perpliq_telemetry::init_logging()?;

    info!("Starting perpliq v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli.url, cli.keypair);
    info!(rpc_url = %config.rpc_url, program_id = %config.program_id, "Configuration loaded");

    let app = Application::new(config)?;

    match cli.command {
        Command::Run { pool_name, mint } => {
            app.run_daemon(&pool_name, mint).await?;
        }
        Command::Init {
            admins,
            min_signatures,
            permissions,
        } => {
            let permissions = Permissions::from(permissions);
            let outcome = app
                .pool_admin()?
                .init(&admins, min_signatures, &permissions)
                .await?;
            print_outcome(&outcome);
        }
        Command::AddPool { pool_name } => {
            print_outcome(&app.pool_admin()?.add_pool(&pool_name).await?);
        }
        Command::RemovePool { pool_name } => {
            print_outcome(&app.pool_admin()?.remove_pool(&pool_name).await?);
        }
        Command::AddCustody {
            pool_name,
            mint,
            oracle,
            oracle_type,
            max_price_error,
            max_price_age_sec,
            stable,
            is_virtual,
        } => {
            let mut oracle = OracleParams::new(oracle, oracle_type.into());
            if let Some(max_price_error) = max_price_error {
                oracle.max_price_error = max_price_error;
            }
            if let Some(max_price_age_sec) = max_price_age_sec {
                oracle.max_price_age_sec = max_price_age_sec;
            }
            let mut custody = CustodyConfig::with_oracle(oracle);
            custody.is_stable = stable;
            custody.is_virtual = is_virtual;
            let outcome = app
                .pool_admin()?
                .add_custody(&pool_name, &mint, &custody)
                .await?;
            print_outcome(&outcome);
        }
        Command::RemoveCustody { pool_name, mint } => {
            print_outcome(&app.pool_admin()?.remove_custody(&pool_name, &mint).await?);
        }
        Command::SetAuthority {
            admins,
            min_signatures,
        } => {
            let outcome = app
                .pool_admin()?
                .set_authority(&admins, min_signatures)
                .await?;
            print_outcome(&outcome);
        }
        Command::SetPermissions(args) => {
            let permissions = Permissions::from(args);
            print_outcome(&app.pool_admin()?.set_permissions(&permissions).await?);
        }
        Command::SetOraclePrice {
            pool_name,
            mint,
            price,
            exponent,
            confidence,
            ema,
        } => {
            let publish_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            let params = SetCustomOraclePriceParams {
                price,
                expo: exponent,
                conf: confidence,
                ema,
                publish_time: i64::try_from(publish_time)?,
            };
            let outcome = app
                .pool_admin()?
                .set_oracle_price(&pool_name, &mint, &params)
                .await?;
            print_outcome(&outcome);
        }
        Command::GetPool { pool_name } => {
            println!("{:#?}", app.pool(&pool_name).await?);
        }
        Command::GetPools => {
            for pool in app.pools().await? {
                println!("{pool:#?}");
            }
        }
        Command::GetCustody { pool_name, mint } => {
            println!("{:#?}", app.custody(&pool_name, &mint).await?);
        }
        Command::GetCustodies { pool_name } => {
            for custody in app.custodies(&pool_name).await? {
                println!("{custody:#?}");
            }
        }
        Command::GetPoolPositions { pool_name } => {
            print_positions(&app.pool_positions(&pool_name).await?);
        }
        Command::GetUserPositions { owner } => {
            print_positions(&app.user_positions(&owner).await?);
        }
        Command::GetLiquidationState { position } => {
            let payer = app.signer()?.pubkey();
            let health = app.liquidation_state(position, payer).await?;
            println!("{position}: {health:?}");
        }
        Command::GetLiquidationPrice {
            position,
            add_collateral,
            remove_collateral,
        } => {
            let payer = app.signer()?.pubkey();
            let price = app
                .liquidation_price(position, add_collateral, remove_collateral, payer)
                .await?;
            println!("{price}");
        }
        Command::GetPnl { position } => {
            let payer = app.signer()?.pubkey();
            println!("{:#?}", app.pnl(position, payer).await?);
        }
        Command::GetEntryPriceAndFee {
            pool_name,
            mint,
            collateral_mint,
            side,
            collateral,
            size,
        } => {
            let payer = app.signer()?.pubkey();
            let params = GetEntryPriceAndFeeParams {
                collateral,
                size,
                side,
            };
            let quote = app
                .entry_price_and_fee(&pool_name, &mint, &collateral_mint, &params, payer)
                .await?;
            println!("{quote:#?}");
        }
        Command::GetExitPriceAndFee { position } => {
            let payer = app.signer()?.pubkey();
            println!("{:#?}", app.exit_price_and_fee(position, payer).await?);
        }
        Command::GetOraclePrice {
            pool_name,
            mint,
            ema,
        } => {
            let payer = app.signer()?.pubkey();
            println!("{}", app.oracle_price(&pool_name, &mint, ema, payer).await?);
        }
        Command::GetAum { pool_name } => {
            let payer = app.signer()?.pubkey();
            println!("{}", app.aum(&pool_name, payer).await?);
        }
        Command::GetMultisig => {
            println!("{:#?}", app.multisig().await?);
        }
        Command::GetPerpetuals => {
            println!("{:#?}", app.perpetuals().await?);
        }
    }

    Ok(())
}
