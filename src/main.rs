//! Notary withdrawal CLI
//!
//! Runs the withdrawal steps of one notary node against a shared ledger directory.

use clap::{Parser, Subcommand};
use notary_withdrawal::cli::{self, AppState};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notary-withdrawal")]
#[command(version = "0.1.0")]
#[command(about = "Federated Bitcoin withdrawals for a notary node", long_about = None)]
struct Cli {
    /// Data directory for wallet, registry and ledger
    #[arg(short, long, default_value = ".notary_data")]
    data_dir: PathBuf,

    /// Config file (defaults to <data-dir>/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a notary key
    Keygen {
        /// Import this hex private key instead of generating one
        #[arg(short, long)]
        import: Option<String>,
    },

    /// Register a multisig address
    Register {
        /// Comma-separated hex public keys of the signers
        #[arg(short, long, value_delimiter = ',', required = true)]
        keys: Vec<String>,

        /// Required signatures (defaults to n*2/3+1)
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Client account owning the address
        #[arg(short, long, conflicts_with = "change")]
        owner: Option<String>,

        /// Use the address for change
        #[arg(long)]
        change: bool,
    },

    /// Record an unspent output paid to a watched address
    Fund {
        #[arg(short, long)]
        address: String,

        #[arg(long)]
        txid: String,

        #[arg(long, default_value = "0")]
        vout: u32,

        /// Value in satoshi
        #[arg(long)]
        value: u64,

        #[arg(long, default_value = "6")]
        confirmations: u32,
    },

    /// Create, sign and publish a withdrawal
    Withdraw {
        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in satoshi
        #[arg(short, long)]
        amount: u64,

        /// Ledger account requesting the withdrawal
        #[arg(short, long, default_value = "client@notary")]
        source: String,
    },

    /// Show signatures published for a withdrawal
    Signatures {
        /// Transaction hash (full or shortened)
        #[arg(long)]
        tx: String,
    },

    /// Assemble a withdrawal once enough signatures are published
    Finalize {
        /// Transaction hash (full or shortened)
        #[arg(long)]
        tx: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut state = AppState::new(cli.data_dir, cli.config)?;

    match cli.command {
        Commands::Keygen { import } => {
            cli::cmd_keygen(&mut state, import.as_deref())?;
        }

        Commands::Register {
            keys,
            threshold,
            owner,
            change,
        } => {
            cli::cmd_register(&mut state, keys, threshold, owner, change)?;
        }

        Commands::Fund {
            address,
            txid,
            vout,
            value,
            confirmations,
        } => {
            cli::cmd_fund(&mut state, &address, &txid, vout, value, confirmations)?;
        }

        Commands::Withdraw { to, amount, source } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_withdraw(&state, &to, amount, &source))?;
        }

        Commands::Signatures { tx } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_signatures(&state, &tx))?;
        }

        Commands::Finalize { tx } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_finalize(&mut state, &tx))?;
        }
    }

    Ok(())
}
