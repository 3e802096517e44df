mod report;

use clap::{Parser, Subcommand};
use meilibridge::engine::{SearchEngine, SettingsUpdate};
use meilibridge::{BridgeConfig, IndexRegistry, NoCache};
use meilibridge_client::MeiliClient;
use report::{settings_block, status_report, StatusFilter};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meilibridge", about = "Inspect and maintain Meilisearch indexes")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "MEILIBRIDGE_CONFIG", default_value = "meilibridge.json")]
    config: String,
    #[arg(long, env = "MEILIBRIDGE_HOST")]
    host: Option<String>,
    #[arg(long, env = "MEILIBRIDGE_PORT")]
    port: Option<u16>,
    #[arg(long, env = "MEILIBRIDGE_MASTER_KEY", hide_env_values = true)]
    master_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Database size, last update and document counts per index
    Status {
        /// Show only indexes the engine is currently indexing
        #[arg(long)]
        indexing: bool,
        /// Comma separated model names, e.g. blog.BlogPage,home.HomePage
        #[arg(long)]
        models: Option<String>,
    },
    /// Settings of every index
    Indexes,
    /// Settings of one index as JSON
    Settings { label: String },
    /// Push the configured stop words and ranking rules to every index
    ApplySettings,
}

fn load_config(cli: &Cli) -> meilibridge::Result<BridgeConfig> {
    let mut config = BridgeConfig::load_or_env(&cli.config)?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(key) = &cli.master_key {
        config.master_key = Some(key.clone());
    }
    Ok(config)
}

async fn run_indexes(client: &MeiliClient) -> meilibridge::Result<()> {
    let stats = client.stats().await?;
    println!("{}", report::rule());
    if stats.indexes.is_empty() {
        println!("No indexes created yet");
    }
    for (label, index) in &stats.indexes {
        match client.get_settings(label).await {
            Ok(settings) => print!("{}", settings_block(label, index.is_indexing, &settings)),
            Err(e) => {
                tracing::warn!("[SETTINGS {}] Failed to fetch settings: {}", label, e);
                println!("{} - settings unavailable: {}", label, e);
            }
        }
        println!();
        println!("{}", report::rule());
    }
    Ok(())
}

async fn run_settings(
    client: Arc<MeiliClient>,
    config: BridgeConfig,
    label: &str,
) -> meilibridge::Result<()> {
    let registry = IndexRegistry::new(client, Arc::new(NoCache), Arc::new(config));
    let settings = registry.index_settings(label).await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn run_apply_settings(
    client: &MeiliClient,
    config: &BridgeConfig,
) -> meilibridge::Result<()> {
    let update = SettingsUpdate {
        ranking_rules: Some(config.ranking_rules.clone()),
        stop_words: Some(config.stop_words.clone()),
        ..Default::default()
    };
    for index in client.list_indexes(config.query_limit).await? {
        match client.update_settings(&index.uid, &update).await {
            Ok(()) => println!("{}: settings update enqueued", index.uid),
            Err(e) => {
                tracing::warn!("[SETTINGS {}] Failed to update settings: {}", index.uid, e);
                println!("{}: failed: {}", index.uid, e);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;
    let client = Arc::new(MeiliClient::from_config(&config)?);
    tracing::debug!("Using engine at {}", client.base_url());

    match cli.command {
        Command::Status { indexing, models } => {
            let stats = client.stats().await?;
            let filter = StatusFilter::new(models.as_deref(), indexing);
            print!("{}", status_report(&stats, &filter));
        }
        Command::Indexes => run_indexes(&client).await?,
        Command::Settings { label } => run_settings(client, config, &label).await?,
        Command::ApplySettings => run_apply_settings(&client, &config).await?,
    }
    Ok(())
}
