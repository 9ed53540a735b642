use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cardwallet_core::api::{http_providers, FailoverCoordinator, NetworkProvider};
use cardwallet_core::utils::{init_logging, LogFormat};
use cardwallet_core::wallet::address::{decode_address, derive_address};
use cardwallet_core::{Chain, NetworkConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cardwallet")]
#[command(about = "Inspect card wallets and their chains", long_about = None)]
struct Cli {
    /// Network config JSON; defaults to the built-in public endpoints
    #[arg(long, global = true, env = "CARDWALLET_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the address of a card public key
    Address {
        #[arg(long)]
        chain: Chain,
        /// Hex public key (secp256k1 compressed/uncompressed or ed25519)
        #[arg(long)]
        public_key: String,
    },
    /// Check an address, exiting non-zero when it is invalid
    Validate {
        #[arg(long)]
        chain: Chain,
        address: String,
    },
    /// Fetch balance and chain state of an address
    Info {
        #[arg(long)]
        chain: Chain,
        address: String,
    },
    /// Fetch current fee rates
    Fee {
        #[arg(long)]
        chain: Chain,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<NetworkConfig> {
    match path {
        Some(path) => NetworkConfig::load(path)
            .with_context(|| format!("loading network config from {}", path.display())),
        None => Ok(NetworkConfig::default()),
    }
}

fn failover(chain: Chain, config: &NetworkConfig) -> Result<FailoverCoordinator> {
    let providers = http_providers(chain, config)?;
    Ok(FailoverCoordinator::new(providers)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_logging(if cli.verbose { "cardwallet_core=debug" } else { "warn" }, format);

    match cli.command {
        Commands::Address { chain, public_key } => {
            let public_key = hex::decode(public_key.trim_start_matches("0x"))
                .context("public key is not valid hex")?;
            println!("{}", derive_address(chain, &public_key)?);
        }
        Commands::Validate { chain, address } => match decode_address(chain, &address) {
            Ok(decoded) => println!("valid {:?} address for {}", decoded.address_type, chain),
            Err(err) => bail!("invalid {} address: {}", chain, err),
        },
        Commands::Info { chain, address } => {
            let config = load_config(cli.config.as_ref())?;
            let info = failover(chain, &config)?.get_info(&address).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Fee { chain } => {
            let config = load_config(cli.config.as_ref())?;
            let estimate = failover(chain, &config)?.get_fee().await?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
    }

    Ok(())
}
