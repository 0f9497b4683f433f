//! Additive multi-factor listing score.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::{ScoringConfig, UnparsedDeadline};
use crate::freshness::FreshnessTracker;
use crate::types::{DeadlineStatus, Freshness, ListingRecord, ScoreBreakdown};

/// Three or four digit amounts (10k KRW units) in salary text.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SALARY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3,4}").expect("valid regex"));

/// Thousands separator between two digits.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DIGIT_GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d)").expect("valid regex"));

/// Scores listings with an immutable weight set.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    major_keywords: Vec<String>,
    mid_keywords: Vec<String>,
    regions: Vec<String>,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            major_keywords: lower(&config.major_firm_keywords),
            mid_keywords: lower(&config.mid_firm_keywords),
            regions: lower(&config.preferred_regions),
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a listing against the prior run's identifiers.
    #[must_use]
    pub fn score(
        &self,
        listing: &ListingRecord,
        prior: &HashSet<String>,
        today: NaiveDate,
    ) -> ScoreBreakdown {
        ScoreBreakdown::new(
            self.deadline_score(listing.deadline.as_ref(), today),
            self.freshness_score(FreshnessTracker::classify(listing, prior)),
            self.firm_score(&listing.company),
            self.salary_score(&listing.salary_text),
            self.region_score(&listing.location),
        )
    }

    /// Deadline component.
    ///
    /// Beyond the 7-day tier the score decays linearly from the ceiling at
    /// zero days out to the floor at the horizon. Past deadlines count as
    /// imminent.
    #[must_use]
    pub fn deadline_score(&self, deadline: Option<&DeadlineStatus>, today: NaiveDate) -> i32 {
        let c = &self.config;
        match deadline {
            Some(DeadlineStatus::Open) => c.no_deadline,
            Some(DeadlineStatus::Date(date)) => {
                let days = (*date - today).num_days();
                if days <= 3 {
                    c.deadline_3d
                } else if days <= 7 {
                    c.deadline_7d
                } else {
                    self.decay(days)
                }
            }
            None => match c.unparsed_deadline {
                UnparsedDeadline::FarFuture => c.decay_floor,
                UnparsedDeadline::NoDeadline => c.no_deadline,
            },
        }
    }

    fn decay(&self, days: i64) -> i32 {
        let c = &self.config;
        let horizon = c.decay_horizon_days.max(1);
        let remaining = horizon - days.clamp(0, horizon);
        let span = i64::from(c.decay_ceiling - c.decay_floor);
        let value = i64::from(c.decay_floor) + span * remaining / horizon;
        i32::try_from(value).unwrap_or(c.decay_floor)
    }

    #[must_use]
    pub fn freshness_score(&self, freshness: Freshness) -> i32 {
        match freshness {
            Freshness::New => self.config.fresh_new,
            Freshness::Old => self.config.fresh_old,
        }
    }

    /// Firm tier bonus; the major tier is checked first.
    #[must_use]
    pub fn firm_score(&self, company: &str) -> i32 {
        let company = company.to_lowercase();
        let tiers = [
            (&self.major_keywords, self.config.firm_major),
            (&self.mid_keywords, self.config.firm_mid),
        ];
        tiers
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| company.contains(k.as_str())))
            .map_or(0, |(_, bonus)| *bonus)
    }

    /// Salary bonus when the largest amount meets the floor and the text is
    /// not marked negotiable.
    #[must_use]
    pub fn salary_score(&self, salary_text: &str) -> i32 {
        let marker = &self.config.salary_negotiable_marker;
        if !marker.is_empty() && salary_text.contains(marker.as_str()) {
            return 0;
        }

        let ungrouped = DIGIT_GROUPING.replace_all(salary_text, "$1$2");
        let max = SALARY_TOKEN
            .find_iter(&ungrouped)
            .filter_map(|m| m.as_str().parse::<u32>().ok())
            .max();

        match max {
            Some(amount) if amount >= self.config.salary_floor => self.config.salary_bonus,
            _ => 0,
        }
    }

    /// Region bonus; `None` when no preferred regions are configured.
    #[must_use]
    pub fn region_score(&self, location: &str) -> Option<i32> {
        if self.regions.is_empty() {
            return None;
        }
        let location = location.to_lowercase();
        let hit = self.regions.iter().any(|r| location.contains(r.as_str()));
        Some(if hit { self.config.region_bonus } else { 0 })
    }
}
