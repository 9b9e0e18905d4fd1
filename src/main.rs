//! fk-crawler - Resilient Flipkart search-result extraction CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use fk_crawler::commands::{HealthCommand, SearchCommand};
use fk_crawler::config::{Config, FetchStrategy, OutputFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fk-crawler",
    version,
    about = "Resilient Flipkart product search CLI",
    long_about = "Extracts normalized product records from Flipkart search results, \
                  with cascading selectors and heuristic fallback extraction."
)]
struct Cli {
    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "FK_PROXY")]
    proxy: Option<String>,

    /// Delay before requests in milliseconds
    #[arg(long, default_value = "2000", global = true, env = "FK_DELAY")]
    delay: u64,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to a selector rules file (TOML)
    #[arg(long, global = true)]
    selectors: Option<PathBuf>,

    /// Fetch strategy (http or render)
    #[arg(long, global = true)]
    strategy: Option<FetchStrategy>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for products
    #[command(alias = "s")]
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        max: usize,

        /// Minimum price filter (rupees)
        #[arg(long)]
        min_price: Option<f64>,

        /// Maximum price filter (rupees)
        #[arg(long)]
        max_price: Option<f64>,

        /// Minimum rating filter (1.0-5.0)
        #[arg(long)]
        min_rating: Option<f32>,

        /// Brand filter (substring match against title)
        #[arg(long)]
        brand: Option<String>,
    },

    /// Probe selector health against a known-stable query
    #[command(alias = "h")]
    Health {
        /// Probe query (defaults to the configured one)
        query: Option<String>,
    },

    /// List the active selector rules
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    config.format = cli.format;
    config.delay_ms = cli.delay;

    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(selectors) = cli.selectors {
        config.selector_file = Some(selectors);
    }
    if let Some(strategy) = cli.strategy {
        config.fetch_strategy = strategy;
    }

    match cli.command {
        Commands::Search { query, max, min_price, max_price, min_rating, brand } => {
            config.max_results = max;
            config.min_price = min_price;
            config.max_price = max_price;
            config.min_rating = min_rating;
            if brand.is_some() {
                config.brand = brand;
            }

            let cmd = SearchCommand::new(config);
            let output = cmd.execute(&query).await?;
            println!("{}", output);
        }

        Commands::Health { query } => {
            let cmd = HealthCommand::new(config);
            let output = cmd.execute(query.as_deref()).await?;
            println!("{}", output);
        }

        Commands::Rules => {
            let selectors =
                fk_crawler::SelectorSet::load(config.selector_file.as_deref());

            for (field, rules) in selectors.describe() {
                println!("{}:", field);
                for rule in rules {
                    println!("  {}", rule);
                }
            }
        }
    }

    Ok(())
}
