use anyhow::{anyhow, Context, Result};
use clap::Parser;
use spray::settings::Settings;
use spray::{utils, BatchDispatcher, Config, EthersChainClient, TracingSink};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Send a fixed amount from every key to every recipient and track confirmations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with recipient addresses, one per line, or a .csv with addresses in the first column
    #[arg(long)]
    recipients: PathBuf,

    /// File with private keys, one per line or comma-separated (falls back to SPRAY_PRIVATE_KEYS)
    #[arg(long)]
    keys_file: Option<PathBuf>,

    /// Node RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Chain ID
    #[arg(long)]
    chain_id: Option<u64>,

    /// Amount sent to each recipient, in ether
    #[arg(long)]
    amount: Option<String>,

    /// Gas price mode: `network` or `max`
    #[arg(long)]
    gas_price_mode: Option<String>,

    /// Seconds between receipt polls
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Receipt polls before a transaction is reported as timed out
    #[arg(long)]
    max_poll_attempts: Option<u32>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Store the effective configuration in the settings file before dispatching
    #[arg(long, default_value_t = false)]
    save_settings: bool,

    /// Stop right after dispatch instead of waiting for confirmations
    #[arg(long, default_value_t = false)]
    no_wait: bool,
}

impl Args {
    /// CLI flags keyed like the environment variables they override.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut map = HashMap::new();
        if let Some(rpc) = &self.rpc_url {
            map.insert("SPRAY_RPC_URL", rpc.clone());
        }
        if let Some(chain_id) = self.chain_id {
            map.insert("SPRAY_CHAIN_ID", chain_id.to_string());
        }
        if let Some(amount) = &self.amount {
            map.insert("SPRAY_TRANSFER_AMOUNT", amount.clone());
        }
        if let Some(mode) = &self.gas_price_mode {
            map.insert("SPRAY_GAS_PRICE_MODE", mode.clone());
        }
        if let Some(secs) = self.poll_interval_secs {
            map.insert("SPRAY_POLL_INTERVAL_SECS", secs.to_string());
        }
        if let Some(attempts) = self.max_poll_attempts {
            map.insert("SPRAY_MAX_POLL_ATTEMPTS", attempts.to_string());
        }
        map
    }
}

fn build_config(args: &Args) -> Result<Config> {
    let path = args.settings.clone().unwrap_or_else(Settings::settings_path);
    let mut settings = Settings::load_from(&path);
    let overrides = args.overrides();
    let config = Config::from_settings(&settings)?
        .apply_env()?
        .apply_overrides(|key| overrides.get(key).cloned())?;

    if args.save_settings {
        settings.update_from(&config);
        settings.save_to(&path)?;
        info!("Saved settings to {}", path.display());
    }
    Ok(config)
}

fn load_keys(args: &Args) -> Result<Vec<spray::PrivateKey>> {
    let raw = match &args.keys_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keys file {}", path.display()))?,
        None => std::env::var("SPRAY_PRIVATE_KEYS")
            .map_err(|_| anyhow!("No keys given: pass --keys-file or set SPRAY_PRIVATE_KEYS"))?,
    };
    Ok(utils::parse_private_keys(&raw))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let keys = load_keys(&args)?;
    let recipients = utils::load_recipients(&args.recipients)?;

    info!(
        "Network: {} (chain {}), {} {} per transfer, gas price mode {}",
        config.network_label(),
        config.chain_id,
        utils::format_ether(config.transfer_value),
        config.native_token(),
        config.gas_price_mode
    );

    let client = Arc::new(EthersChainClient::from_config(&config).await?);
    let sink = Arc::new(TracingSink::new(config.chain_id, config.native_token()));
    let dispatcher = BatchDispatcher::new(client, sink, &config);

    let summary = dispatcher.dispatch(&keys, &recipients).await?;

    let trackers = dispatcher.trackers();
    if args.no_wait {
        trackers.shutdown().await;
    } else if !trackers.is_empty() {
        info!("Waiting for {} confirmations (Ctrl-C to stop)", trackers.len());
        tokio::select! {
            _ = trackers.wait() => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling confirmation tracking");
                trackers.shutdown().await;
            }
        }
    }

    if summary.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
