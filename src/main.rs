//! Mini-Treasury CLI Application
//!
//! A command-line interface for quorum wallets and signed transfer permits.

use clap::{Parser, Subcommand};
use mini_treasury::api::{create_router, ApiState, WsBroadcaster};
use mini_treasury::cli::{self, AppState};
use mini_treasury::crypto::Address;
use mini_treasury::multisig::TransactionId;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "treasury")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Quorum-controlled treasury wallets and signed transfer permits", long_about = None)]
struct Cli {
    /// Data directory for treasury storage
    #[arg(short, long, default_value = ".treasury_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new treasury (token, wallet registry, permit authority)
    Init {
        /// Chain identifier bound into permits
        #[arg(long)]
        chain_id: Option<u64>,

        /// Protocol fee in basis points, paid to the deployer
        #[arg(long)]
        fee_bps: Option<u16>,

        /// Delete existing chain data first
        #[arg(long)]
        force: bool,
    },

    /// Signing key operations
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Credit native currency to an address (development faucet)
    Fund {
        address: Address,
        amount: u128,
    },

    /// Show balances and permit nonce of an address
    Balance { address: Address },

    /// Quorum wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Submit a transaction to a quorum wallet
    ///
    /// Operations: mint:AMOUNT, transfer:TO:AMOUNT, burn:AMOUNT,
    /// transfer-ownership:ADDR, add-owner:ADDR, remove-owner:ADDR,
    /// replace-owner:OLD:NEW, change-requirement:N, send:ADDR
    Submit {
        /// Wallet address
        #[arg(short, long)]
        wallet: Address,

        /// Owner submitting (must have a local key)
        #[arg(short, long)]
        from: Address,

        /// Operation to perform
        op: String,

        /// Short title
        #[arg(short, long)]
        title: Option<String>,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Native value to attach
        #[arg(long, default_value = "0")]
        value: u128,
    },

    /// Confirm a transaction
    Confirm {
        #[arg(short, long)]
        wallet: Address,
        #[arg(short, long)]
        from: Address,
        id: TransactionId,
    },

    /// Revoke a confirmation
    Revoke {
        #[arg(short, long)]
        wallet: Address,
        #[arg(short, long)]
        from: Address,
        id: TransactionId,
    },

    /// Execute a confirmed transaction (retries a failed execution)
    Execute {
        #[arg(short, long)]
        wallet: Address,
        #[arg(short, long)]
        from: Address,
        id: TransactionId,
    },

    /// Token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Transfer permit operations
    Permit {
        #[command(subcommand)]
        action: PermitCommands,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Create a new signing key
    New {
        /// Label for the key
        #[arg(short, long)]
        label: Option<String>,
    },
    /// List all keys
    List,
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a quorum wallet
    Create {
        /// Creator (must have a local key)
        #[arg(short, long)]
        from: Address,

        /// Comma-separated owner addresses
        #[arg(short, long, value_delimiter = ',', required = true)]
        owners: Vec<Address>,

        /// Confirmations required to execute
        #[arg(short, long)]
        required: usize,
    },
    /// Show a wallet
    Show { address: Address },
    /// List a wallet's transactions
    Transactions {
        address: Address,

        /// Only pending transactions
        #[arg(long)]
        pending: bool,

        /// Only executed transactions
        #[arg(long)]
        executed: bool,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Show token information
    Info,
    /// Hand token ownership to another address
    SetOwner {
        /// Current owner (must have a local key)
        #[arg(short, long)]
        from: Address,

        /// New owner, usually a quorum wallet
        #[arg(short, long)]
        to: Address,
    },
}

#[derive(Subcommand)]
enum PermitCommands {
    /// Sign a transfer permit for the holder's next nonce
    Sign {
        /// Token holder (must have a local key)
        #[arg(short, long)]
        from: Address,

        /// Recipient
        #[arg(short, long)]
        to: Address,

        /// Amount to debit from the holder
        #[arg(short, long)]
        amount: u128,

        /// Seconds until the permit expires
        #[arg(long, default_value = "3600")]
        expires_in: u64,

        /// Write the signed transfer to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Relay a signed transfer read from a file
    Relay {
        /// JSON file produced by `permit sign`
        file: PathBuf,

        /// Carve the protocol fee out of the amount
        #[arg(long)]
        with_fee: bool,
    },
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Init runs before any state exists
    if let Commands::Init {
        chain_id,
        fee_bps,
        force,
    } = &cli.command
    {
        return cli::cmd_init(&cli.data_dir, *chain_id, *fee_bps, *force);
    }

    let mut state = AppState::new(cli.data_dir.clone())?;

    match &cli.command {
        Commands::Init { .. } => {}

        Commands::Key { action } => match action {
            KeyCommands::New { label } => cli::cmd_key_new(&state, label.as_deref())?,
            KeyCommands::List => cli::cmd_key_list(&state)?,
        },

        Commands::Fund { address, amount } => cli::cmd_fund(&mut state, address, *amount)?,

        Commands::Balance { address } => cli::cmd_balance(&state, address)?,

        Commands::Wallet { action } => match action {
            WalletCommands::Create {
                from,
                owners,
                required,
            } => cli::cmd_wallet_create(&mut state, from, owners, *required)?,
            WalletCommands::Show { address } => cli::cmd_wallet_show(&state, address)?,
            WalletCommands::Transactions {
                address,
                pending,
                executed,
            } => cli::cmd_wallet_transactions(&state, address, *pending, *executed)?,
        },

        Commands::Submit {
            wallet,
            from,
            op,
            title,
            description,
            value,
        } => cli::cmd_submit(
            &mut state,
            wallet,
            from,
            op,
            title.as_deref(),
            description.as_deref(),
            *value,
        )?,

        Commands::Confirm { wallet, from, id } => cli::cmd_confirm(&mut state, wallet, from, *id)?,

        Commands::Revoke { wallet, from, id } => cli::cmd_revoke(&mut state, wallet, from, *id)?,

        Commands::Execute { wallet, from, id } => cli::cmd_execute(&mut state, wallet, from, *id)?,

        Commands::Token { action } => match action {
            TokenCommands::Info => cli::cmd_token_info(&state)?,
            TokenCommands::SetOwner { from, to } => cli::cmd_token_set_owner(&mut state, from, to)?,
        },

        Commands::Permit { action } => match action {
            PermitCommands::Sign {
                from,
                to,
                amount,
                expires_in,
                out,
            } => cli::cmd_permit_sign(&state, from, to, *amount, *expires_in, out.as_deref())?,
            PermitCommands::Relay { file, with_fee } => {
                cli::cmd_permit_relay(&mut state, file, *with_fee)?
            }
        },

        Commands::Api { action } => match action {
            ApiCommands::Start { port } => {
                let port = port.unwrap_or(state.config.api_port);
                run_api(state, port)?;
            }
        },
    }

    Ok(())
}

fn run_api(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let api_state = ApiState {
            chain: Arc::new(RwLock::new(state.chain)),
            storage: Arc::new(state.storage),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        };
        let shutdown_state = api_state.clone();

        let app = create_router(api_state);
        let addr = format!("0.0.0.0:{}", port);

        println!("🚀 REST API server starting on http://localhost:{}", port);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                                 - Health check");
        println!("   GET  /ws?address=ADDR                        - WebSocket events (optional filter)");
        println!("   GET  /api/chain                              - Chain info");
        println!("   GET  /api/accounts/{{addr}}                    - Balances and nonce");
        println!("   GET  /api/wallets                            - List wallets");
        println!("   GET  /api/wallets/{{addr}}                     - Get wallet");
        println!("   GET  /api/wallets/{{addr}}/transactions        - List transactions");
        println!("   GET  /api/wallets/{{addr}}/transactions/{{id}}   - Get transaction");
        println!("   POST /api/permits                            - Relay signed permit");
        println!();

        // Handle Ctrl+C with graceful shutdown
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down API server...");

            println!("💾 Saving data...");
            let chain = shutdown_state.chain.read().await;
            match shutdown_state.storage.save(&chain) {
                Ok(()) => println!("✅ Data saved successfully!"),
                Err(e) => log::error!("Failed to save chain: {}", e),
            }
            std::process::exit(0);
        });

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
