//! partscout - supplier listing search for part sourcing.
//!
//! Thin operator wrapper around the library's single search contract:
//! resolves a query against the builtin site registry and prints the
//! ranked listings.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partscout::{SearchConfig, SearchEngine, SearchRequest, SiteRegistry};

#[derive(Parser)]
#[command(name = "partscout", about = "Search supplier sites for part listings")]
struct Cli {
    /// Component to search for, e.g. "front brake pad".
    query: String,

    /// Maximum number of sites to consult.
    #[arg(long, default_value_t = 5)]
    max_sites: usize,

    /// Maximum number of listings to return.
    #[arg(long, default_value_t = 20)]
    max_results: usize,

    /// Skip the web-search augmenter.
    #[arg(long)]
    no_augment: bool,

    /// Print results as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "partscout=debug"
    } else {
        "partscout=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SearchConfig {
        augment: !cli.no_augment,
        ..SearchConfig::default()
    };

    let engine = SearchEngine::new(Arc::new(SiteRegistry::builtin()), config);
    let request = SearchRequest {
        query: cli.query,
        max_sites: cli.max_sites,
        max_results: cli.max_results,
    };
    let results = engine.search(&request).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!(
        "{} listings for \"{}\" in {:.1}s",
        results.listings.len(),
        results.query,
        results.elapsed.as_secs_f64()
    );
    for listing in &results.listings {
        let price = listing
            .price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no price".to_string());
        println!(
            "  [{:>4.2}] {} - {} ({})",
            listing.relevance, listing.title, price, listing.site
        );
        println!("         {}", listing.link);
    }

    let mut statuses: Vec<_> = results.site_status.iter().collect();
    statuses.sort_by(|a, b| a.0.cmp(b.0));
    for (site, status) in statuses {
        println!("  site {site}: {status:?}");
    }

    Ok(())
}
