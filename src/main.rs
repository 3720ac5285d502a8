// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podcore::{
    ChapterOutcome, ChapterSyncConfig, ChapterSynchronizer, Episode, EpisodeLister, ListingConfig,
    ListingRequest, Page, PgStore, ReaperConfig, Reaper, ReqwestClient, ServiceConfig, SortKey,
    SyncStatus,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static BOOKMARK: Emoji<'_, '_> = Emoji("🔖 ", "[#] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[~] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Episode listings, chapter synchronization and cleanup for a podcast catalogue
#[derive(Parser, Debug)]
#[command(name = "podcore")]
#[command(about = "Episode listings, chapter synchronization and cleanup for a podcast catalogue")]
#[command(version)]
struct Args {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Timeout for remote chapter fetches, in seconds
    #[arg(long, default_value = "15", global = true)]
    fetch_timeout: u64,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List episodes, optionally scoped to categories or podcasts
    Episodes {
        /// Comma-separated category ids
        #[arg(long, conflicts_with = "podcasts")]
        categories: Option<String>,

        /// Comma-separated podcast ids
        #[arg(long)]
        podcasts: Option<String>,

        /// Case-insensitive title filter
        #[arg(short, long)]
        search: Option<String>,

        /// Sort key, e.g. top-past-week or most-recent
        #[arg(long)]
        sort: Option<SortKey>,

        #[arg(long, default_value = "0")]
        skip: u64,

        #[arg(long, default_value = "20")]
        take: u64,

        /// Attach the owning podcast to each episode
        #[arg(long)]
        include_podcast: bool,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an episode's chapters, refreshing them from the remote document when stale
    Chapters {
        episode_id: String,

        /// User that owns newly created chapters
        #[arg(long, env = "PODCORE_SUPER_USER_ID")]
        super_user_id: String,
    },

    /// Remove non-public episodes without media references
    Reap {
        #[arg(long, default_value = "100", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        batch_size: usize,

        /// Pause between passes, in milliseconds
        #[arg(long, default_value = "1000")]
        throttle_ms: u64,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "podcore=debug" } else { "podcore=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn service_config(args: &Args, super_user_id: &str) -> Result<ServiceConfig> {
    let database_url = args
        .database_url
        .clone()
        .context("No database URL given; pass --database-url or set DATABASE_URL")?;

    Ok(ServiceConfig {
        database_url,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        listing: ListingConfig::default(),
        chapters: ChapterSyncConfig::new(super_user_id),
        reaper: ReaperConfig::default(),
    })
}

async fn connect(config: &ServiceConfig) -> Result<Arc<PgStore>> {
    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    store
        .migrate()
        .await
        .context("Failed to apply database migrations")?;
    Ok(Arc::new(store))
}

fn print_episodes(page: &Page<Episode>) {
    println!(
        "{} {} of {} episodes\n",
        "Showing".dimmed(),
        page.len().to_string().cyan(),
        page.total.to_string().cyan().bold()
    );
    for episode in &page.items {
        let date = episode
            .pub_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let title = episode.title.as_deref().unwrap_or("(untitled)");
        let podcast = episode
            .podcast
            .as_ref()
            .and_then(|podcast| podcast.title.as_deref())
            .map(|title| format!(" [{}]", title.magenta()))
            .unwrap_or_default();
        println!(
            "  {} {}{} {}",
            date.dimmed(),
            title.bold(),
            podcast,
            format!("({} this week)", episode.past_week_total_unique_pageviews).dimmed()
        );
    }
}

fn format_timestamp(seconds: i32) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    println!(
        "\n{}{} {}\n",
        MICROPHONE,
        "podcore".bold().magenta(),
        "- Podcast Catalogue".dimmed()
    );

    match &args.command {
        Command::Episodes {
            categories,
            podcasts,
            search,
            sort,
            skip,
            take,
            include_podcast,
            json,
        } => {
            let config = service_config(&args, "")?;
            let store = connect(&config).await?;
            let lister = EpisodeLister::new(store, config.listing);
            let request = ListingRequest {
                include_podcast: *include_podcast,
                search_text: search.clone(),
                sort: *sort,
                skip: *skip,
                take: *take,
            };

            let page = match (categories, podcasts) {
                (Some(ids), _) => lister.list_by_categories(&request, ids).await,
                (None, Some(ids)) => lister.list_by_podcasts(&request, ids).await,
                (None, None) => lister.list_all(&request).await,
            }
            .context("Failed to list episodes")?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_episodes(&page);
            }
        }

        Command::Chapters {
            episode_id,
            super_user_id,
        } => {
            let config = service_config(&args, super_user_id)?;
            let store = connect(&config).await?;
            let client = ReqwestClient::with_timeout(config.fetch_timeout)
                .context("Failed to build HTTP client")?;
            let synchronizer = ChapterSynchronizer::new(store, client, config.chapters);

            let sync = synchronizer
                .retrieve_chapters(episode_id)
                .await
                .context("Failed to retrieve chapters")?;

            match &sync.status {
                SyncStatus::NoChaptersUrl => {
                    println!("{}", "Episode has no chapters URL".dimmed())
                }
                SyncStatus::Fresh => println!("{}", "Chapters are up to date".dimmed()),
                SyncStatus::Synced(report) => {
                    println!(
                        "{SUCCESS}{} {} created, {} updated, {} unchanged, {} suppressed, {} failed",
                        "Synced:".bold().green(),
                        report.created().to_string().green(),
                        report.updated().to_string().cyan(),
                        report.unchanged().to_string().dimmed(),
                        report.suppressed().to_string().yellow(),
                        if report.failed() > 0 {
                            report.failed().to_string().red().bold()
                        } else {
                            report.failed().to_string().green()
                        }
                    );
                    for outcome in &report.outcomes {
                        if let ChapterOutcome::Failed { start_time, reason } = outcome {
                            let at = start_time.map(format_timestamp).unwrap_or_default();
                            println!("  {}{} {}", CROSS, at.yellow(), reason.dimmed());
                        }
                    }
                }
                SyncStatus::Unavailable(reason) => {
                    println!(
                        "{WARNING}{} {}",
                        "Chapters source unavailable:".yellow(),
                        reason.dimmed()
                    );
                }
            }

            println!("\n{BOOKMARK}{} chapters", sync.total.to_string().cyan().bold());
            for chapter in &sync.chapters {
                println!(
                    "  {} {}",
                    format_timestamp(chapter.start_time).dimmed(),
                    chapter.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }

        Command::Reap {
            batch_size,
            throttle_ms,
        } => {
            let mut config = service_config(&args, "")?;
            config.reaper = ReaperConfig {
                batch_size: *batch_size,
                throttle: Duration::from_millis(*throttle_ms),
            };
            let store = connect(&config).await?;
            let reaper = Reaper::new(store, config.reaper);

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}")?);
            spinner.enable_steady_tick(Duration::from_millis(100));

            spinner.set_message(format!("{BROOM}Pass {}", "1".cyan()));
            let summary = match reaper
                .run_until_exhausted_with(|totals| {
                    spinner.set_message(format!(
                        "{BROOM}Pass {}, {} episodes removed",
                        (totals.passes + 1).to_string().cyan(),
                        totals.removed.to_string().cyan()
                    ));
                })
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    spinner.abandon_with_message(format!("{CROSS}{}", "Reaper pass failed".red()));
                    return Err(e).context("Failed to remove dead episodes");
                }
            };

            spinner.finish_and_clear();
            println!(
                "{SUCCESS}{} {} episodes removed in {} passes",
                "Reaping complete:".bold().green(),
                summary.removed.to_string().green().bold(),
                summary.passes.to_string().cyan()
            );
        }
    }

    Ok(())
}
