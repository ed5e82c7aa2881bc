//! tube-harvest main entry point
//!
//! This is the command-line interface for searching videos, collecting and
//! translating comments, reporting and pushing results to a webhook.

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tube_harvest::analytics::{format_duration, format_number, print_report};
use tube_harvest::batch::{BatchSummary, LoggingObserver};
use tube_harvest::client::{MessageOptions, MessageTemplate, SearchOrder, SearchQuery};
use tube_harvest::config::{load_config_with_hash, usable_keys, Config};
use tube_harvest::model::Comment;
use tube_harvest::Session;
use tracing_subscriber::EnvFilter;

/// tube-harvest: YouTube comment harvesting
///
/// Searches videos through the YouTube Data API, collects their comments in
/// paced batches, translates them and pushes summaries to a chat webhook.
#[derive(Parser, Debug)]
#[command(name = "tube-harvest")]
#[command(version)]
#[command(about = "YouTube search, comment collection and translation", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and show the effective settings
    Validate,

    /// Search for videos
    Search {
        query: String,

        /// Number of results (defaults to youtube.max-results)
        #[arg(short, long)]
        max: Option<u32>,

        /// relevance, date, viewCount, rating or title
        #[arg(long, default_value = "relevance")]
        order: SearchOrder,

        /// Only videos published on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        after: Option<DateTime<Utc>>,

        /// Only videos published before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        before: Option<DateTime<Utc>>,

        /// Track the results
        #[arg(long)]
        add: bool,

        #[arg(long)]
        json: bool,
    },

    /// Track videos by URL or id
    Add {
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// List tracked videos
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show a tracked video with its collected comments
    Show { id: String },

    /// Stop tracking a video
    Remove { id: String },

    /// Collect comments for tracked videos (all when no id is given)
    Comments {
        ids: Vec<String>,

        /// Push the batch summary to the webhook afterwards
        #[arg(long)]
        push: bool,
    },

    /// Translate collected comments (all tracked videos when no id is given)
    Translate {
        ids: Vec<String>,

        /// Target language (defaults to translation.default-target)
        #[arg(long)]
        to: Option<String>,
    },

    /// Translate a single text
    TranslateText {
        text: String,

        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        from: Option<String>,
    },

    /// Print analytics over tracked videos and collected comments
    Report {
        #[arg(long)]
        json: bool,
    },

    /// Push videos and their comments to the webhook
    Push {
        ids: Vec<String>,

        /// full or simple
        #[arg(long, default_value = "full")]
        template: MessageTemplate,

        #[arg(long, default_value_t = 50)]
        max_comments: usize,

        /// Skip the summary message after a multi-video push
        #[arg(long)]
        no_summary: bool,
    },

    /// Show recent batch runs
    Runs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show API quota and translation usage
    Usage,

    /// Show search history and suggestions
    History {
        /// Suggest past queries matching this prefix
        #[arg(long)]
        suggest: Option<String>,

        /// Clear every history list
        #[arg(long)]
        clear: bool,
    },
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
        .and_then(|d| {
            d.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .ok_or_else(|| "invalid date".to_string())
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", hash);

    if let Command::Validate = cli.command {
        return handle_validate(&config);
    }

    let mut session = Session::open(config).context("failed to open session")?;

    match cli.command {
        Command::Validate => handle_validate(session.config())?,
        Command::Search {
            query,
            max,
            order,
            after,
            before,
            add,
            json,
        } => {
            let mut search = SearchQuery::new(
                query,
                max.unwrap_or(session.config().youtube.max_results),
            );
            search.order = order;
            search.published_after = after;
            search.published_before = before;
            handle_search(&mut session, &search, add, json).await?
        }
        Command::Add { inputs } => {
            let added = session.add_videos(&inputs).await?;
            println!("Added {} videos", added.len());
            for video in &added {
                println!("  {} {}", video.id, video.title);
            }
        }
        Command::List { json } => handle_list(&session, json)?,
        Command::Show { id } => handle_show(&mut session, &id)?,
        Command::Remove { id } => {
            let removed = session.remove_video(&id)?;
            println!("Removed {} ({})", removed.id, removed.title);
        }
        Command::Comments { ids, push } => handle_comments(&mut session, &ids, push).await?,
        Command::Translate { ids, to } => handle_translate(&mut session, &ids, to.as_deref()).await?,
        Command::TranslateText { text, to, from } => {
            let target = to.unwrap_or_else(|| session.config().translation.default_target.clone());
            let result = session
                .translate_text(&text, &target, from.as_deref())
                .await?;
            println!("{}", result.translated_text);
            tracing::info!(
                "{} -> {} via {} (confidence {:.2})",
                result.source_lang,
                result.target_lang,
                result.provider,
                result.confidence
            );
        }
        Command::Report { json } => {
            let report = session.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Push {
            ids,
            template,
            max_comments,
            no_summary,
        } => {
            let options = MessageOptions {
                template,
                max_comments,
            };
            handle_push(&mut session, &ids, &options, !no_summary).await?
        }
        Command::Runs { limit } => handle_runs(&session, limit)?,
        Command::Usage => handle_usage(&session),
        Command::History { suggest, clear } => handle_history(&mut session, suggest, clear)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tube_harvest=info,warn"),
            1 => EnvFilter::new("tube_harvest=debug,info"),
            2 => EnvFilter::new("tube_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `validate`: shows the effective configuration
fn handle_validate(config: &Config) -> anyhow::Result<()> {
    println!("=== tube-harvest Configuration ===\n");

    let usable = usable_keys(&config.youtube.api_keys).len();
    println!("YouTube:");
    println!(
        "  API keys: {} configured, {} usable",
        config.youtube.api_keys.len(),
        usable
    );
    println!("  Endpoint: {}", config.youtube.base_url);
    println!("  Daily quota: {} units", config.youtube.daily_quota);
    println!("  Comments per video: {}", config.youtube.max_comments);

    println!("\nTranslation:");
    println!("  Endpoint: {}", config.translation.base_url);
    println!(
        "  Default: {} -> {}",
        config.translation.source_lang, config.translation.default_target
    );
    println!("  Segment length: {}", config.translation.max_text_length);

    println!("\nBatch:");
    println!("  Request interval: {}ms", config.batch.request_interval);
    println!("  Max retries: {}", config.batch.max_retries);
    println!("  Skip existing: {}", config.batch.skip_existing);
    println!("  Continue on error: {}", config.batch.continue_on_error);

    println!("\nCache:");
    println!(
        "  Bound: {} entries, {} kept after eviction",
        config.cache.max_entries, config.cache.retain_entries
    );

    println!("\nWebhook:");
    match (&config.webhook.url, config.webhook.enabled) {
        (Some(url), true) => println!("  Enabled: {}", url),
        (Some(_), false) => println!("  Configured but disabled"),
        (None, _) => println!("  Not configured"),
    }

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    if usable == 0 {
        println!("\n! No API key passes the shape check; requests will likely fail");
    }
    println!("\n✓ Configuration is valid");
    Ok(())
}

async fn handle_search(
    session: &mut Session,
    query: &SearchQuery,
    add: bool,
    json: bool,
) -> anyhow::Result<()> {
    let videos = session.search_videos(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&videos)?);
    } else {
        println!("Found {} videos for '{}'\n", videos.len(), query.query);
        for (i, video) in videos.iter().enumerate() {
            println!("{:>3}. {} [{}]", i + 1, video.title, video.id);
            println!(
                "     {} - {} views, {} likes, {} comments",
                video.channel,
                format_number(video.views),
                format_number(video.likes),
                format_number(video.comments)
            );
        }
    }

    if add {
        let added = session.track_videos(videos)?;
        println!("\nTracking {} new videos", added);
    }
    Ok(())
}

fn handle_list(session: &Session, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session.videos())?);
        return Ok(());
    }

    let with_comments = session.videos_with_comments();
    println!("Tracked videos ({}):", session.videos().len());
    for video in session.videos() {
        println!(
            "  {} [{}] {} ({} views){}",
            video.id,
            video.status,
            video.title,
            format_number(video.views),
            if with_comments.contains(&video.id) {
                ", comments collected"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn handle_show(session: &mut Session, id: &str) -> anyhow::Result<()> {
    let (video, comments) = session.view_video(id)?;
    println!("{}", video.title);
    println!("  {}", video.url);
    println!("  Channel: {}", video.channel);
    println!(
        "  {} views, {} likes, {} comments, {:.2}% engagement",
        format_number(video.views),
        format_number(video.likes),
        format_number(video.comments),
        video.engagement_rate()
    );
    println!("  Published: {}", video.published_at.format("%Y-%m-%d %H:%M"));

    if comments.is_empty() {
        println!("\nNo comments collected yet");
        return Ok(());
    }
    println!("\nComments ({}):", comments.len());
    for comment in &comments {
        let indent = if comment.is_reply { "    " } else { "  " };
        println!(
            "{}{} ({} likes): {}",
            indent, comment.author, comment.likes, comment.text_original
        );
        if let Some(t) = &comment.translation {
            println!("{}  [{}] {}", indent, t.target_lang, t.translated_text);
        }
    }
    Ok(())
}

/// Spawns a task that cancels the active batch on Ctrl-C
fn cancel_on_interrupt(session: &Session) -> tokio::task::JoinHandle<()> {
    let runner = session.runner();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            runner.cancel();
        }
    })
}

fn print_batch_summary(title: &str, summary: &BatchSummary<Vec<Comment>>) {
    println!("\n=== {} ===", title);
    println!("  Total: {}", summary.total);
    println!("  Processed: {}", summary.processed);
    println!("  Successful: {}", summary.successful);
    println!("  Failed: {}", summary.failed);
    println!("  Skipped: {}", summary.skipped);
    println!("  Duration: {}", format_duration(summary.duration));
    if summary.cancelled {
        println!("  Cancelled before completion");
    }
}

async fn handle_comments(session: &mut Session, ids: &[String], push: bool) -> anyhow::Result<()> {
    let interrupt = cancel_on_interrupt(session);
    let result = session.collect_comments(ids, &LoggingObserver).await;
    interrupt.abort();
    let summary = result?;

    print_batch_summary("Comment Collection", &summary);

    if push {
        session.push_batch_summary(&summary).await?;
        println!("\n✓ Summary pushed to webhook");
    }
    Ok(())
}

async fn handle_translate(
    session: &mut Session,
    ids: &[String],
    to: Option<&str>,
) -> anyhow::Result<()> {
    let interrupt = cancel_on_interrupt(session);
    let result = session.translate_comments(ids, to, &LoggingObserver).await;
    interrupt.abort();
    let summary = result?;

    print_batch_summary("Translation", &summary);
    Ok(())
}

async fn handle_push(
    session: &mut Session,
    ids: &[String],
    options: &MessageOptions,
    send_summary: bool,
) -> anyhow::Result<()> {
    if ids.len() == 1 {
        session.push_video(&ids[0], options).await?;
        println!("✓ Pushed {}", ids[0]);
        return Ok(());
    }

    let report = session.push_videos(ids, options, send_summary).await?;
    println!(
        "Pushed {}/{} videos ({} failed)",
        report.successful, report.total, report.failed
    );
    for (id, error) in &report.errors {
        println!("  {}: {}", id, error);
    }
    if report.failed > 0 && report.successful == 0 {
        bail!("every push failed");
    }
    Ok(())
}

fn handle_runs(session: &Session, limit: usize) -> anyhow::Result<()> {
    let runs = session.recent_runs(limit)?;
    if runs.is_empty() {
        println!("No batch runs recorded");
        return Ok(());
    }

    println!("Recent runs:");
    for run in runs {
        println!(
            "  #{} {} {} started {} - {}/{} processed ({} ok, {} failed, {} skipped){}",
            run.id,
            run.kind.to_db_string(),
            run.status.to_db_string(),
            run.started_at,
            run.processed,
            run.total,
            run.successful,
            run.failed,
            run.skipped,
            run.error_message
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_usage(session: &Session) {
    let usage = session.usage();
    println!("YouTube API:");
    println!("  Requests today: {}", usage.api.daily_requests);
    println!("  Requests total: {}", usage.api.total_requests);
    println!(
        "  Quota: {} used, {} of {} left",
        usage.api.quota_used, usage.remaining_quota, usage.daily_quota
    );
    if let Some(last) = usage.api.last_used {
        println!("  Last used: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    println!("\nTranslation:");
    println!(
        "  Requests: {} ({} ok, {} failed, {} cache hits)",
        usage.translation.total_translations,
        usage.translation.successful,
        usage.translation.failed,
        usage.translation.cached
    );
    println!("  Cached translations: {}", usage.translation_cache_entries);
    println!("  Cached comment sets: {}", usage.comment_cache_entries);
}

fn handle_history(
    session: &mut Session,
    suggest: Option<String>,
    clear: bool,
) -> anyhow::Result<()> {
    if clear {
        session.history_mut().clear()?;
        println!("History cleared");
        return Ok(());
    }

    let history = session.history();
    if let Some(prefix) = suggest {
        for query in history.suggestions(&prefix, 10) {
            println!("{}", query);
        }
        return Ok(());
    }

    println!("Top searches (7 days):");
    for entry in history.top_searches(7, 10) {
        println!("  {} ({}x)", entry.query, entry.count);
    }

    println!("\nRecent searches:");
    for entry in history.searches().iter().take(10) {
        println!(
            "  {} - {} results, {}",
            entry.query,
            entry.results,
            entry.timestamp.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\nRecently viewed:");
    for entry in history.views().iter().take(10) {
        println!("  {} [{}]", entry.title, entry.video_id);
    }

    println!("\nRecent actions:");
    for entry in history.actions().iter().take(10) {
        println!(
            "  {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.action
        );
    }
    Ok(())
}
