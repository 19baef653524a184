//! eos-history CLI: look up and normalize EOS transactions.

use clap::{Parser, Subcommand};
use eos_history::{Cache, FetchConfig, Fetcher, Provider};
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Lookup(args) => run_lookup(args),
        Command::Probe(args) => run_probe(args),
    }
}

#[derive(Parser)]
#[command(name = "eos-history")]
#[command(about = "Look up EOS transactions via public history nodes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a transaction and print its normalized record.
    Lookup(LookupArgs),
    /// Probe the configured history nodes for reachability.
    Probe(ProbeArgs),
}

#[derive(Parser)]
struct LookupArgs {
    /// Transaction id (hex hash).
    #[arg(long)]
    hash: String,
    /// Account whose transfer trace should be selected.
    #[arg(long)]
    account: String,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    offline: bool,
    /// Extra history node base URL, tried before the built-in providers.
    #[arg(long)]
    endpoint: Vec<String>,
}

#[derive(Parser)]
struct ProbeArgs {
    /// Extra history node base URL, probed alongside the built-in providers.
    #[arg(long)]
    endpoint: Vec<String>,
}

fn cache_path(cache_dir: &std::path::Path) -> PathBuf {
    cache_dir.join("cache.sqlite")
}

fn providers_from(endpoints: &[String]) -> Result<Vec<Provider>, Box<dyn std::error::Error>> {
    let mut providers = Vec::new();
    for (i, url) in endpoints.iter().enumerate() {
        providers.push(Provider::new(format!("custom-{}", i + 1), url)?);
    }
    providers.extend(Provider::defaults());
    Ok(providers)
}

fn run_lookup(args: LookupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cache = Cache::open(cache_path(&args.cache_dir))?;
    let config = FetchConfig {
        offline: args.offline,
        ..Default::default()
    };
    let fetcher = Fetcher::new(config, providers_from(&args.endpoint)?, Some(cache))?;
    let rt = tokio::runtime::Runtime::new()?;
    let tx = rt.block_on(fetcher.lookup(&args.hash, &args.account))?;
    info!(requests = fetcher.request_count(), "lookup complete");
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

fn run_probe(args: ProbeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = Fetcher::new(FetchConfig::default(), providers_from(&args.endpoint)?, None)?;
    let rt = tokio::runtime::Runtime::new()?;
    for provider in fetcher.providers() {
        let ok = rt.block_on(fetcher.check_reachability(provider));
        let state = if ok { "reachable" } else { "unreachable" };
        println!("{}: {}", provider.display_name(), state);
    }
    Ok(())
}
