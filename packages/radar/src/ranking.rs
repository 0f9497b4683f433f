//! Extract, score, rank and persist in one run.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::config::{FeedConfig, ScoringConfig, TableConfig};
use crate::enrich::{enrich_listings, DetailFetcher};
use crate::error::Result;
use crate::extract::{extract_feed, extract_table, FeedTransport};
use crate::freshness::FreshnessTracker;
use crate::runtime::block_on;
use crate::scoring::ScoringEngine;
use crate::types::{ListingRecord, RankedListing, ScoreBreakdown};

/// Produces the listings of one run.
pub trait ListingSource {
    fn fetch_listings(&self, discovered_at: DateTime<FixedOffset>) -> Result<Vec<ListingRecord>>;
}

/// An HTML document holding a single listing table.
pub struct TableSource {
    html: String,
    config: TableConfig,
}

impl TableSource {
    pub fn new(html: impl Into<String>, config: TableConfig) -> Self {
        Self {
            html: html.into(),
            config,
        }
    }
}

impl ListingSource for TableSource {
    fn fetch_listings(&self, discovered_at: DateTime<FixedOffset>) -> Result<Vec<ListingRecord>> {
        Ok(extract_table(&self.html, &self.config, discovered_at))
    }
}

/// The paginated search backend.
pub struct FeedSource<T: FeedTransport> {
    transport: Arc<T>,
    config: FeedConfig,
}

impl<T: FeedTransport> FeedSource<T> {
    pub fn new(transport: T, config: FeedConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
        }
    }
}

impl<T: FeedTransport + 'static> ListingSource for FeedSource<T> {
    /// Must not be called from inside an async task.
    fn fetch_listings(&self, discovered_at: DateTime<FixedOffset>) -> Result<Vec<ListingRecord>> {
        block_on(extract_feed(
            Arc::clone(&self.transport),
            &self.config,
            discovered_at,
        ))
    }
}

/// Result of a ranking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Top listings by score plus the number of listings extracted.
    Ranked {
        top: Vec<RankedListing>,
        total: usize,
    },

    /// Extraction produced nothing; freshness state was not touched.
    NoData,
}

struct Enrichment {
    fetcher: Arc<dyn DetailFetcher>,
    concurrency: usize,
}

/// Orchestrates one ranking run.
pub struct RankingPipeline {
    source: Box<dyn ListingSource>,
    engine: ScoringEngine,
    tracker: FreshnessTracker,
    enrichment: Option<Enrichment>,
}

impl RankingPipeline {
    pub fn new(
        source: Box<dyn ListingSource>,
        config: ScoringConfig,
        tracker: FreshnessTracker,
    ) -> Self {
        Self {
            source,
            engine: ScoringEngine::new(config),
            tracker,
            enrichment: None,
        }
    }

    /// Fill empty salary and category fields from detail pages before scoring.
    #[must_use]
    pub fn with_enrichment(mut self, fetcher: Arc<dyn DetailFetcher>, concurrency: usize) -> Self {
        self.enrichment = Some(Enrichment {
            fetcher,
            concurrency,
        });
        self
    }

    /// Run extraction, scoring, ranking and state persistence.
    ///
    /// Ties keep extraction order. Freshness state is written from every
    /// extracted listing, not only the top ones, and only when extraction
    /// produced something. A source error counts as no data.
    pub fn run(&self, now: DateTime<FixedOffset>) -> Result<RunOutcome> {
        let mut listings = match self.source.fetch_listings(now) {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(error = %e, "Listing source failed");
                Vec::new()
            }
        };

        if listings.is_empty() {
            tracing::warn!("No listings extracted, leaving freshness state untouched");
            return Ok(RunOutcome::NoData);
        }

        if let Some(enrichment) = &self.enrichment {
            let fetcher = Arc::clone(&enrichment.fetcher);
            if let Err(e) = block_on(enrich_listings(&mut listings, fetcher, enrichment.concurrency)) {
                tracing::warn!(error = %e, "Detail enrichment unavailable, scoring listings as extracted");
            }
        }

        let today = now.date_naive();
        let prior = self.tracker.load();
        let scores: Vec<ScoreBreakdown> = listings
            .iter()
            .map(|listing| self.engine.score(listing, &prior, today))
            .collect();

        self.tracker.save(&listings)?;

        let total = listings.len();
        let mut ranked: Vec<RankedListing> = listings
            .into_iter()
            .zip(scores)
            .map(|(listing, score)| RankedListing { listing, score })
            .collect();
        // sort_by is stable: equal totals keep extraction order
        ranked.sort_by(|a, b| b.score.total.cmp(&a.score.total));
        ranked.truncate(self.engine.config().top_k);

        tracing::info!(total, selected = ranked.len(), "Ranked listings");
        Ok(RunOutcome::Ranked { top: ranked, total })
    }
}
