//! Command-line interface for the radar.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::{
    parse_date, site_now, FeedConfig, ScoringConfig, TableConfig, DEFAULT_LEDGER_PATH,
    DEFAULT_STATE_PATH, ENRICH_CONCURRENCY,
};
use crate::deadline::resolve_deadline;
use crate::enrich::HttpDetailFetcher;
use crate::error::{RadarError, Result};
use crate::extract::extract_table;
use crate::freshness::{FreshnessPolicy, FreshnessTracker};
use crate::http::HttpFeedTransport;
use crate::persist::write_atomic;
use crate::ranking::{FeedSource, ListingSource, RankingPipeline, RunOutcome, TableSource};
use crate::reconcile::{parse_messages, InboundMessage, SignalLedger, StatusReconciler};
use crate::types::{DeadlineStatus, RankedListing};

/// Recruit Radar - rank job postings and track applications.
#[derive(Parser)]
#[command(name = "recruit-radar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract listings, score them and print the top ones.
    #[command(group(ArgGroup::new("source").required(true).args(["table", "feed"])))]
    Rank {
        /// HTML file containing a listing table
        #[arg(long)]
        table: Option<PathBuf>,

        /// Query the live search feed
        #[arg(long)]
        feed: bool,

        /// Base URL for resolving relative links
        #[arg(long)]
        base_url: Option<String>,

        /// Freshness state file
        #[arg(long, default_value = DEFAULT_STATE_PATH)]
        state: PathBuf,

        /// Which earlier runs count for freshness
        #[arg(long, value_enum, default_value_t = PolicyArg::PreviousRun)]
        policy: PolicyArg,

        /// Number of listings to select (overrides the config file)
        #[arg(long)]
        top: Option<usize>,

        /// YAML file with scoring weights
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preferred region; may be repeated
        #[arg(long = "region")]
        regions: Vec<String>,

        /// Fetch detail pages to fill missing salary and category
        #[arg(long)]
        enrich: bool,

        /// Reference date in YYYY-MM-DD format (default: today)
        #[arg(short, long)]
        date: Option<String>,

        /// Also write the ranking as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Annotate a listing table with application status from messages.
    Reconcile {
        /// HTML file containing a listing table
        #[arg(long)]
        table: PathBuf,

        /// JSON array of messages: [{id, subject, body, date}]
        #[arg(long)]
        messages: PathBuf,

        /// Signal ledger to merge new messages into
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_LEDGER_PATH)]
        ledger: Option<PathBuf>,

        /// Base URL for resolving relative links
        #[arg(long)]
        base_url: Option<String>,

        /// Also write the annotations as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show how a deadline text is resolved.
    Deadline {
        /// Deadline text, e.g. "~06/30(월)" or "상시채용"
        text: String,

        /// Reference date in YYYY-MM-DD format (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    PreviousRun,
    AllRuns,
}

impl From<PolicyArg> for FreshnessPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::PreviousRun => Self::PreviousRun,
            PolicyArg::AllRuns => Self::AllRuns,
        }
    }
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            table,
            feed: _,
            base_url,
            state,
            policy,
            top,
            config,
            regions,
            enrich,
            date,
            json,
        } => {
            let mut scoring = match config {
                Some(path) => ScoringConfig::from_yaml_file(&path)?,
                None => ScoringConfig::default(),
            };
            if let Some(top) = top {
                scoring = scoring.with_top_k(top);
            }
            if !regions.is_empty() {
                scoring = scoring.with_preferred_regions(regions);
            }
            scoring.validate()?;

            let options = RankOptions {
                table,
                base_url,
                tracker: FreshnessTracker::new(state).with_policy(policy.into()),
                scoring,
                enrich,
                json,
            };
            rank_command(options, reference_time(date.as_deref())?)
        }
        Commands::Reconcile {
            table,
            messages,
            ledger,
            base_url,
            json,
        } => reconcile_command(
            &table,
            &messages,
            ledger.as_deref(),
            base_url,
            json.as_deref(),
        ),
        Commands::Deadline { text, date } => deadline_command(&text, date.as_deref()),
    }
}

/// Now in the site timezone, or midnight of `date` when given.
fn reference_time(date: Option<&str>) -> Result<DateTime<FixedOffset>> {
    let now = site_now();
    let Some(date) = date else {
        return Ok(now);
    };
    let day: NaiveDate = parse_date(date)?;
    day.and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(*now.offset()).single())
        .ok_or_else(|| RadarError::InvalidDate(date.to_string()))
}

struct RankOptions {
    table: Option<PathBuf>,
    base_url: Option<String>,
    tracker: FreshnessTracker,
    scoring: ScoringConfig,
    enrich: bool,
    json: Option<PathBuf>,
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Execute the rank command.
fn rank_command(options: RankOptions, now: DateTime<FixedOffset>) -> Result<()> {
    let source: Box<dyn ListingSource> = match &options.table {
        Some(path) => {
            let html = std::fs::read_to_string(path)?;
            let mut config = TableConfig::default();
            if let Some(base_url) = &options.base_url {
                config = config.with_base_url(base_url.clone());
            }
            Box::new(TableSource::new(html, config))
        }
        None => {
            let mut config = FeedConfig::default();
            if let Some(base_url) = &options.base_url {
                config = config.with_base_url(base_url.clone());
            }
            let transport = HttpFeedTransport::new(config.clone())?;
            Box::new(FeedSource::new(transport, config))
        }
    };

    let mut pipeline = RankingPipeline::new(source, options.scoring, options.tracker);
    if options.enrich {
        pipeline = pipeline.with_enrichment(Arc::new(HttpDetailFetcher::new()?), ENRICH_CONCURRENCY);
    }

    let pb = spinner("Collecting listings...");
    let outcome = pipeline.run(now);
    pb.finish_and_clear();

    let (top, total) = match outcome? {
        RunOutcome::Ranked { top, total } => (top, total),
        RunOutcome::NoData => {
            println!(
                "{} no listings found, freshness state left unchanged",
                style("No data:").yellow().bold()
            );
            return Ok(());
        }
    };

    println!(
        "{} top {} of {} listings",
        style("Ranked").bold(),
        style(top.len()).cyan(),
        style(total).cyan()
    );
    println!();
    for (rank, ranked) in top.iter().enumerate() {
        print_ranked(rank + 1, ranked);
    }

    if let Some(path) = options.json {
        #[derive(Serialize)]
        struct Report<'a> {
            total: usize,
            listings: &'a [RankedListing],
        }
        let report = Report {
            total,
            listings: &top,
        };
        write_atomic(&path, &serde_json::to_string_pretty(&report)?)?;
        println!("{} {}", style("Saved to:").green().bold(), path.display());
    }

    Ok(())
}

fn print_ranked(rank: usize, ranked: &RankedListing) {
    let listing = &ranked.listing;
    let score = &ranked.score;

    println!(
        "{:>2}. {} {} - {}",
        rank,
        style(format!("[{}]", score.total)).green().bold(),
        style(&listing.title).bold(),
        listing.company
    );

    let mut details = Vec::new();
    if !listing.location.is_empty() {
        details.push(listing.location.clone());
    }
    if !listing.deadline_raw.is_empty() {
        details.push(format!("마감 {}", listing.deadline_raw));
    }
    if !listing.salary_text.is_empty() {
        details.push(listing.salary_text.clone());
    }
    if !details.is_empty() {
        println!("    {}", details.join(" | "));
    }

    let mut parts = vec![
        format!("deadline {}", score.deadline),
        format!("fresh {}", score.freshness),
        format!("firm {}", score.firm),
        format!("salary {}", score.salary),
    ];
    if let Some(region) = score.region {
        parts.push(format!("region {region}"));
    }
    println!("    {}", style(parts.join(", ")).dim());

    if !listing.url.is_empty() {
        println!("    {}", style(&listing.url).cyan());
    }
}

/// Execute the reconcile command.
fn reconcile_command(
    table: &Path,
    messages: &Path,
    ledger_path: Option<&Path>,
    base_url: Option<String>,
    json: Option<&Path>,
) -> Result<()> {
    let mut config = TableConfig::default();
    if let Some(base_url) = base_url {
        config = config.with_base_url(base_url);
    }
    let listings = extract_table(&std::fs::read_to_string(table)?, &config, site_now());

    let inbound: Vec<InboundMessage> = serde_json::from_str(&std::fs::read_to_string(messages)?)?;

    let signals = match ledger_path {
        Some(path) => {
            let mut ledger = SignalLedger::load(path);
            let known = ledger.known_ids();
            let fresh: Vec<InboundMessage> = inbound
                .into_iter()
                .filter(|m| !known.contains(m.id.as_str()))
                .collect();
            let added = ledger.merge(parse_messages(&fresh), chrono::Utc::now());
            ledger.save(path)?;
            println!(
                "{} {} new signal(s) into {}",
                style("Merged").bold(),
                style(added).cyan(),
                path.display()
            );
            ledger.messages
        }
        None => parse_messages(&inbound),
    };

    let annotations = StatusReconciler::new().reconcile(&signals, &listings);

    for (listing, annotation) in listings.iter().zip(&annotations) {
        let label = annotation.status.label();
        let label = match annotation.tier {
            Some(_) => style(label).green().bold(),
            None => style(label).dim(),
        };
        let tier = annotation
            .tier
            .map(|t| format!(" ({t:?})"))
            .unwrap_or_default();
        println!(
            "{} {} - {}{}",
            label,
            listing.title,
            listing.company,
            style(tier).dim()
        );
    }

    if let Some(path) = json {
        write_atomic(path, &serde_json::to_string_pretty(&annotations)?)?;
        println!("{} {}", style("Saved to:").green().bold(), path.display());
    }

    Ok(())
}

/// Execute the deadline command.
fn deadline_command(text: &str, date: Option<&str>) -> Result<()> {
    let today = match date {
        Some(date) => parse_date(date)?,
        None => site_now().date_naive(),
    };

    match resolve_deadline(text, today) {
        Some(DeadlineStatus::Date(deadline)) => println!(
            "{} ({} days)",
            style(deadline).green(),
            (deadline - today).num_days()
        ),
        Some(DeadlineStatus::Open) => println!("{}", style("open-ended").cyan()),
        None => println!("{}", style("unrecognized").yellow()),
    }
    Ok(())
}
