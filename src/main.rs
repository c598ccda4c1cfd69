use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use seat_scraper::config::Config;
use seat_scraper::pipeline::{write_records, ChromeSessionFactory, Pipeline};
use seat_scraper::seats::Poller;
use seat_scraper::sources::{load_show_names, ShowSource};
use seat_scraper::{logging, metrics, EventIdentifier};

/// Exit status when too many events ended up without a seat count.
const UNRESOLVED_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(name = "seat_scraper")]
#[command(about = "Live seat availability scraper for ticketing show pages")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to $SEAT_SCRAPER_CONFIG or config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every show in the list, scrape its events and write the records
    Run {
        /// Show-name list: a local file or an http(s) URL
        #[arg(long)]
        shows: String,
        /// Column holding the short name when the list is a JSON sheet export
        #[arg(long)]
        column: Option<String>,
        /// Output directory for the JSON Lines file
        #[arg(long)]
        output: Option<String>,
        /// Exit with status 2 when the unresolved share exceeds this value (0.0-1.0)
        #[arg(long, default_value_t = 1.0)]
        max_unresolved_rate: f64,
    },
    /// Scrape a single show-detail page
    Show {
        url: String,
    },
    /// Resolve the seat count of one event on a show-detail page
    Resolve {
        show_url: String,
        event_id: String,
    },
    /// List show-detail links for a show name
    Search {
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            if !Path::new(path).exists() {
                anyhow::bail!("config file '{}' does not exist", path);
            }
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling pending waits");
                cancel.cancel();
            }
        });
    }

    let poller = Poller::from_config(&config.timeouts, cancel);
    let pipeline = Pipeline::new(
        &config,
        ChromeSessionFactory::new(config.browser.clone()),
        poller,
    );

    match cli.command {
        Commands::Run {
            shows,
            column,
            output,
            max_unresolved_rate,
        } => {
            let column = column.unwrap_or_else(|| config.run.column.clone());
            let names = load_show_names(&ShowSource::parse(&shows), &column).await?;
            println!("🚀 Scraping seat availability for {} shows...", names.len());

            let result = pipeline.run(&names).await?;
            let output_dir = output.unwrap_or_else(|| config.run.output_dir.clone());
            let output_file = write_records(&result.records, Path::new(&output_dir))?;

            let summary = &result.summary;
            println!("\n📊 Run Results:");
            println!("   Shows requested: {}", summary.shows_requested);
            println!("   Show pages scraped: {}", summary.links_visited);
            println!("   Events: {}", summary.records);
            println!("   Seat counts resolved: {}", summary.resolved);
            println!("   Unresolved: {}", summary.unresolved);
            println!("   Rows without event id: {}", summary.rows_without_id);
            println!("   Failed pages: {}", summary.failed_pages);
            println!("   Session restarts: {}", summary.session_restarts);
            println!("   Output file: {}", output_file.display());

            if summary.exceeds(max_unresolved_rate) {
                error!(
                    "Unresolved rate {:.2} exceeds threshold {:.2}",
                    summary.unresolved_rate(),
                    max_unresolved_rate
                );
                println!("⚠️  Too many events without a seat count");
                return Ok(ExitCode::from(UNRESOLVED_EXIT_CODE));
            }
            info!("Run completed");
            println!("✅ Run completed successfully");
        }
        Commands::Show { url } => {
            let scrape = pipeline.run_show(&url).await?;
            for record in &scrape.records {
                println!("{}", serde_json::to_string(record)?);
            }
            if scrape.rows_without_id > 0 {
                warn!("{} rows had no event id", scrape.rows_without_id);
            }
        }
        Commands::Resolve { show_url, event_id } => {
            let resolution = pipeline
                .resolve_event(&show_url, &EventIdentifier::new(event_id))
                .await?;
            println!("{}", serde_json::to_string(&resolution.availability)?);
        }
        Commands::Search { name } => {
            for link in pipeline.search(&name).await? {
                println!("{}", link);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
