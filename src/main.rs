//! # NicheFire CLI (`nichefire`)
//!
//! ## Usage
//!
//! ```bash
//! nichefire --config ./config/nichefire.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nichefire serve` | Start the HTTP server |
//! | `nichefire check` | Validate configuration, including billing credentials |
//! | `nichefire routes <path>...` | Show how the guard classifies paths |
//! | `nichefire outliers` | Print the filtered, sorted outlier list |
//! | `nichefire session --user-id <id>` | Mint a development session cookie |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use nichefire::auth::SignedCookieProvider;
use nichefire::catalog::{derive_view, format_count, viral_badge};
use nichefire::config::{self, Config};
use nichefire::guard::{RouteClass, RouteTable, UnclassifiedPolicy};
use nichefire::models::{Profile, SortKey};
use nichefire::outliers::{FileOutlierSource, HttpOutlierSource, OutlierSource};
use nichefire::server;

/// NicheFire: a subscription-gated dashboard of viral YouTube Shorts outliers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Billing and session secrets may come from the environment instead.
#[derive(Parser)]
#[command(name = "nichefire", version, about = "NicheFire: find the next viral hit")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nichefire.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Fails before binding if a billing credential or the session secret
    /// is missing.
    Serve,

    /// Validate the configuration and print a summary.
    Check,

    /// Classify request paths against the route table.
    Routes {
        /// Paths to classify, e.g. `/dashboard` or `/static/app.css`.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Fetch the outlier list and print it in dashboard order.
    Outliers {
        /// Case-insensitive filter on title or creator.
        #[arg(long, default_value = "")]
        search: String,

        /// Sort key: `viral_score`, `view_count`, `like_count`, or `subscriber_count`.
        #[arg(long, default_value = "viral_score")]
        sort: SortKey,

        /// Read the list from a JSON file instead of `[data].outliers_url`.
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Maximum number of rows to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Mint a signed session cookie for local development.
    Session {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
    },
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Check => {
            run_check(&cfg)?;
        }
        Commands::Routes { paths } => {
            run_routes(&cfg, &paths)?;
        }
        Commands::Outliers {
            search,
            sort,
            from_file,
            limit,
        } => {
            let source: Box<dyn OutlierSource> = match from_file {
                Some(path) => Box::new(FileOutlierSource::new(path)),
                None => Box::new(HttpOutlierSource::new(&cfg.data)?),
            };
            run_outliers(source.as_ref(), &search, sort, limit).await?;
        }
        Commands::Session {
            user_id,
            email,
            first_name,
        } => {
            let provider = SignedCookieProvider::new(
                cfg.session_secret()?,
                &cfg.auth.cookie_name,
                cfg.auth.session_ttl_secs,
            );
            let token = provider.issue(&Profile {
                id: user_id,
                email,
                first_name,
            });
            println!("{}={}", provider.cookie_name(), token);
        }
    }

    Ok(())
}

fn run_check(cfg: &Config) -> Result<()> {
    cfg.validate_for_serve()?;
    let table = RouteTable::from_config(&cfg.routes)?;
    println!("config ok");
    println!("  bind:         {}", cfg.server.bind);
    println!("  outliers:     {}", cfg.data.outliers_url);
    println!("  billing api:  {}", cfg.billing.api_base);
    println!("  route rules:  {}", table.rules().len());
    Ok(())
}

fn run_routes(cfg: &Config, paths: &[String]) -> Result<()> {
    let table = RouteTable::from_config(&cfg.routes)?;
    for path in paths {
        let class = match table.classify(path) {
            Some(c) => c.as_str(),
            None => "unclassified",
        };
        let decision = match table.classify(path) {
            Some(RouteClass::Excluded) => "not intercepted",
            Some(RouteClass::Public) => "allow",
            Some(RouteClass::Protected) => "requires session",
            None if table.unclassified() == UnclassifiedPolicy::Protect => "requires session",
            None => "allow",
        };
        println!("{:<32} {:<14} {}", path, class, decision);
    }
    Ok(())
}

async fn run_outliers(
    source: &dyn OutlierSource,
    search: &str,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let videos = source.fetch().await?;
    let view = derive_view(&videos, search, sort);

    if view.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Sorted by {} ({} of {} videos)", sort.label(), view.len(), videos.len());
    for (i, v) in view.iter().take(limit.unwrap_or(usize::MAX)).enumerate() {
        println!(
            "{:>3}. [{:>4}] {:>7} views  {:>7} likes  {:>7} subs  {} by {}",
            i + 1,
            viral_badge(v.viral_score),
            format_count(v.view_count.unwrap_or(0)),
            format_count(v.like_count.unwrap_or(0)),
            format_count(v.subscriber_count.unwrap_or(0)),
            v.title,
            v.creator_name
        );
    }
    Ok(())
}
