//! Recruit Radar - rank job postings and track applications.
//!
//! This crate extracts job listings from a recruiting site's search results,
//! scores them with a configurable multi-factor policy, remembers which
//! listings were seen in earlier runs, and reconciles listings against
//! "application submitted" messages.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use recruit_radar::{resolve_deadline, DeadlineStatus};
//!
//! let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! assert_eq!(resolve_deadline("상시채용", today), Some(DeadlineStatus::Open));
//! assert_eq!(
//!     resolve_deadline("~06/03(화)", today),
//!     Some(DeadlineStatus::Date(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()))
//! );
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, scoring weights and source configuration
//! - [`types`]: Core data types (listings, scores, signals, annotations)
//! - [`error`]: Error types and Result alias
//! - [`deadline`]: Free-form deadline resolution
//! - [`extract`]: Table and paginated feed extraction
//! - [`http`]: HTTP client and live feed transport
//! - [`enrich`]: Optional detail-page enrichment
//! - [`freshness`]: Cross-run freshness state
//! - [`scoring`]: Multi-factor scoring engine
//! - [`ranking`]: Extract, score, rank and persist pipeline
//! - [`reconcile`]: Application status reconciliation
//! - [`persist`]: Atomic state file writes
//! - [`runtime`]: Async runtime driving concurrent fetches
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod deadline;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod freshness;
pub mod http;
pub mod persist;
pub mod ranking;
pub mod reconcile;
pub mod runtime;
pub mod scoring;
pub mod types;

// Re-export commonly used items
pub use config::{FeedConfig, ScoringConfig, TableConfig};
pub use deadline::{resolve_deadline, DeadlineResolver};
pub use error::{RadarError, Result};
pub use freshness::{FreshnessPolicy, FreshnessTracker};
pub use ranking::{FeedSource, ListingSource, RankingPipeline, RunOutcome, TableSource};
pub use reconcile::StatusReconciler;
pub use scoring::ScoringEngine;
pub use types::{
    ApplicationSignal, ApplicationStatus, DeadlineStatus, ListingKey, ListingRecord, MatchTier,
    RankedListing, ScoreBreakdown, StatusAnnotation,
};
