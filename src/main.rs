mod api;
mod chain;
mod expiry;
mod gateway;
mod scraper;

#[cfg(test)]
mod test_support;

use chain::{ChainReader, RpcChainReader};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sentinels_channels::TelegramApi;
use sentinels_core::{
    config::{self, Config},
    traits::Provider,
};
use sentinels_providers::{gemini::GeminiProvider, openai::OpenAiProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// How often idle community conversations are evicted.
const HISTORY_SWEEP_EVERY: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(
    name = "sentinels",
    version,
    about = "SmartSentinels agent backend: Telegram agents, subscriptions, airdrop"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the expiry scanner.
    Serve,
    /// Run one subscription expiry scan and exit.
    ScanExpiry,
    /// Check genesis NFT ownership for a wallet.
    Verify {
        /// Wallet address (0x + 40 hex).
        wallet: String,
    },
    /// Print configuration health.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_tracing(&cfg)?;

    match cli.command {
        Commands::Serve => serve(cfg).await?,
        Commands::ScanExpiry => {
            let store = sentinels_store::connect(&cfg.store).await?;
            let report =
                expiry::scan_once(store.as_ref(), cfg.expiry.warn_days, Utc::now()).await?;
            println!(
                "expiry scan: {} warnings, {} expired, {} skipped",
                report.warnings, report.expired, report.skipped
            );
        }
        Commands::Verify { wallet } => {
            let contract = chain::validate_address(&cfg.chain.genesis_contract)
                .map_err(|e| anyhow::anyhow!("genesis contract is not configured: {e}"))?;
            let owner = chain::validate_address(&wallet)
                .map_err(|e| anyhow::anyhow!("invalid wallet address: {e}"))?;
            let reader = RpcChainReader::from_config(&cfg.chain)?;
            let balance = reader.balance_of(&contract, &owner).await?;
            println!(
                "{}: balance {balance}, verified: {}",
                chain::checksum(&owner),
                !balance.is_zero()
            );
        }
        Commands::Status => status(&cli.config, &cfg).await,
    }

    Ok(())
}

/// Stdout logging plus an optional daily rolling file.
///
/// The returned guard must live as long as the process to flush the file sink.
fn init_tracing(
    cfg: &Config,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if cfg.server.log_dir.trim().is_empty() {
        (None, None)
    } else {
        let dir = config::shellexpand(&cfg.server.log_dir);
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::daily(dir, "sentinels.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Build the configured provider.
fn build_provider(cfg: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let timeout = Duration::from_secs(cfg.provider.timeout_secs);
    match cfg.provider.default.as_str() {
        "gemini" => {
            let g = cfg.provider.gemini.clone().unwrap_or_default();
            Ok(Arc::new(GeminiProvider::from_config(
                g.api_key, g.model, timeout,
            )?))
        }
        "openai" => {
            let o = cfg.provider.openai.clone().unwrap_or_default();
            Ok(Arc::new(OpenAiProvider::from_config(
                o.base_url, o.api_key, o.model, timeout,
            )?))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let provider = build_provider(&cfg)?;
    if !provider.is_available().await {
        warn!(
            "provider '{}' is not reachable; replies will fall back to the apology text",
            provider.name()
        );
    }

    let store = sentinels_store::connect(&cfg.store).await?;
    let messenger = Arc::new(TelegramApi::new()?);
    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::from_config(&cfg.chain)?);
    let scraper = Arc::new(scraper::Scraper::from_config(&cfg.scraper)?);

    if cfg.server.public_url.is_empty() {
        warn!("server.public_url is empty; deploy-agent will fail until PUBLIC_URL is set");
    }
    if cfg.telegram.community_bot_token.is_empty() {
        info!("community bot disabled (no TELEGRAM_BOT_TOKEN)");
    }

    let gateway = Arc::new(gateway::Gateway::new(
        provider.clone(),
        messenger.clone(),
        store.clone(),
        cfg.telegram.clone(),
    ));
    tokio::spawn(gateway.clone().history_sweeper(HISTORY_SWEEP_EVERY));

    if cfg.expiry.enabled {
        tokio::spawn(expiry::expiry_loop(store.clone(), cfg.expiry.clone()));
        info!(
            "expiry scanner: every {}s, warning {} days ahead",
            cfg.expiry.poll_interval_secs, cfg.expiry.warn_days
        );
    }

    let state = api::AppState {
        gateway,
        store,
        provider,
        messenger,
        chain,
        scraper,
        admin_key: cfg.admin.admin_key.clone(),
        public_url: cfg.server.public_url.clone(),
        genesis_contract: cfg.chain.genesis_contract.clone(),
        uptime: Instant::now(),
    };
    api::serve(state, &cfg.server.host, cfg.server.port).await
}

async fn status(config_path: &str, cfg: &Config) {
    println!("SmartSentinels status check\n");
    println!("Config: {config_path}");
    println!("Store backend: {}", cfg.store.backend);
    match sentinels_store::connect(&cfg.store).await {
        Ok(store) => println!("  {}: reachable", store.name()),
        Err(e) => println!("  {}: {e}", cfg.store.backend),
    }
    println!();

    println!("Default provider: {}", cfg.provider.default);
    match build_provider(cfg) {
        Ok(p) => println!(
            "  {}: {}",
            p.name(),
            if p.is_available().await {
                "available"
            } else {
                "not available"
            }
        ),
        Err(e) => println!("  {e}"),
    }
    println!();

    println!(
        "  community bot: {}",
        if cfg.telegram.community_bot_token.is_empty() {
            "disabled"
        } else {
            "configured"
        }
    );
    println!(
        "  public url: {}",
        if cfg.server.public_url.is_empty() {
            "missing (deploy-agent disabled)"
        } else {
            cfg.server.public_url.as_str()
        }
    );
    println!(
        "  admin key: {}",
        if cfg.admin.admin_key.is_empty() {
            "missing (admin endpoints disabled)"
        } else {
            "configured"
        }
    );
    println!("  rpc: {}", cfg.chain.rpc_url);
    println!(
        "  genesis contract: {}",
        match chain::validate_address(&cfg.chain.genesis_contract) {
            Ok(addr) => chain::checksum(&addr),
            Err(_) => "missing or invalid".to_string(),
        }
    );
}
