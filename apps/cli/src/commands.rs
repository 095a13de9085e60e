//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use reviewharvest_core::ReviewCache;
use reviewharvest_crawler::ReviewScraper;
use reviewharvest_shared::{
    AppConfig, CachedResult, ReviewField, ScrapeConfig, init_config, load_config,
    load_config_from, normalize_query,
};
use reviewharvest_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ReviewHarvest: scrape product reviews once, serve them from cache after.
#[derive(Parser)]
#[command(
    name = "reviewharvest",
    version,
    about = "Fetch, normalize and cache product reviews for a search query.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.reviewharvest/reviewharvest.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding `[store] database_path`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show reviews for a query, scraping only if nothing is cached.
    Lookup {
        /// Search query (words are joined).
        #[arg(required = true)]
        query: Vec<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Scrape a query again and replace its cached entry.
    Refresh {
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Delete the cached entry for a query.
    Drop {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List cached product names for a query without scraping.
    Products {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List cached query keys.
    List,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reviewharvest=info",
        1 => "reviewharvest=debug",
        _ => "reviewharvest=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so --json output stays clean
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let db_path = match cli.db {
        Some(path) => path,
        None => config.database_path()?,
    };

    match cli.command {
        Command::Lookup { query, json } => cmd_lookup(&config, &db_path, &query, json).await,
        Command::Refresh { query, json } => cmd_refresh(&config, &db_path, &query, json).await,
        Command::Drop { query } => cmd_drop(&db_path, &query).await,
        Command::Products { query } => cmd_products(&db_path, &query).await,
        Command::List => cmd_list(&db_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn open_cache(
    config: &AppConfig,
    db_path: &Path,
) -> Result<ReviewCache<Storage, ReviewScraper>> {
    let scraper = ReviewScraper::new(ScrapeConfig::try_from(config)?)?;
    let storage = Storage::open(db_path).await?;
    Ok(ReviewCache::new(storage, scraper).with_dedupe(config.cache.dedupe_in_flight))
}

async fn cmd_lookup(
    config: &AppConfig,
    db_path: &Path,
    words: &[String],
    json: bool,
) -> Result<()> {
    let query = words.join(" ");
    let cache = open_cache(config, db_path).await?;

    info!(query = %query, db = %db_path.display(), "looking up reviews");
    let spinner = spinner(format!("Looking up '{query}'"))?;
    let result = cache.lookup(&query).await;
    spinner.finish_and_clear();

    print_result(&result?, json)
}

async fn cmd_refresh(
    config: &AppConfig,
    db_path: &Path,
    words: &[String],
    json: bool,
) -> Result<()> {
    let query = words.join(" ");
    let cache = open_cache(config, db_path).await?;

    let spinner = spinner(format!("Re-scraping '{query}'"))?;
    let result = cache.refresh(&query).await;
    spinner.finish_and_clear();

    print_result(&result?, json)
}

async fn cmd_drop(db_path: &Path, words: &[String]) -> Result<()> {
    let key = normalize_query(&words.join(" "));
    if key.is_empty() {
        return Err(eyre!("query is blank"));
    }

    let storage = Storage::open(db_path).await?;
    storage.drop_key(&key).await?;
    println!("Dropped cached entry '{key}'");
    Ok(())
}

async fn cmd_products(db_path: &Path, words: &[String]) -> Result<()> {
    let key = normalize_query(&words.join(" "));
    let Some(storage) = open_existing(db_path).await? else {
        println!("No cached entries.");
        return Ok(());
    };

    let cached = storage.get(&key).await?;
    if cached.is_empty() {
        println!("Nothing cached for '{key}'. Run `reviewharvest lookup` first.");
        return Ok(());
    }

    for set in &cached {
        for name in set.names() {
            println!("{name}");
        }
    }
    Ok(())
}

async fn cmd_list(db_path: &Path) -> Result<()> {
    let Some(storage) = open_existing(db_path).await? else {
        println!("No cached entries.");
        return Ok(());
    };

    let keys = storage.list_keys().await?;
    if keys.is_empty() {
        println!("No cached entries.");
        return Ok(());
    }

    println!("  {:<32} {:>8}  {}", "KEY", "RECORDS", "CACHED");
    for summary in keys {
        println!(
            "  {:<32} {:>8}  {}",
            summary.key,
            summary.records,
            summary.first_cached_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Read-only handle, or `None` when nothing has been cached yet.
async fn open_existing(db_path: &Path) -> Result<Option<Storage>> {
    if !db_path.exists() {
        return Ok(None);
    }
    Ok(Some(Storage::open_readonly(db_path).await?))
}

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

fn print_result(result: &CachedResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("No reviews found.");
        return Ok(());
    }

    for set in result {
        for product in set.iter() {
            println!();
            println!("  {}", product.name);
            println!("  {}", "-".repeat(product.name.chars().count()));
            if product.reviews.is_empty() {
                println!("    (no reviews)");
            }
            for review in &product.reviews {
                for field in ReviewField::ALL {
                    println!("    {:<16} {}", label(field), review.field_or_sentinel(field));
                }
                println!();
            }
        }
    }
    Ok(())
}

fn label(field: ReviewField) -> &'static str {
    match field {
        ReviewField::ReviewerName => "Reviewer:",
        ReviewField::Rating => "Rating:",
        ReviewField::CommentHeading => "Heading:",
        ReviewField::CommentBody => "Comment:",
    }
}
