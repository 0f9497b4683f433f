//! Single-table documents.
//!
//! Column roles are found by matching header text against ordered synonym
//! lists. A role without a matching header yields empty values for every
//! row rather than failing the extraction.

use chrono::{DateTime, FixedOffset};
use scraper::{ElementRef, Html, Selector};

use super::{dedup_listings, element_text, extract_identifier, LinkResolver};
use crate::config::{HeaderSynonyms, TableConfig};
use crate::deadline::resolve_deadline;
use crate::types::ListingRecord;

/// Semantic role of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Title,
    Company,
    Location,
    JobCategory,
    Deadline,
    Salary,
    DirectLink,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 7] = [
        Self::Title,
        Self::Company,
        Self::Location,
        Self::JobCategory,
        Self::Deadline,
        Self::Salary,
        Self::DirectLink,
    ];

    fn synonyms(self, synonyms: &HeaderSynonyms) -> &[String] {
        match self {
            Self::Title => &synonyms.title,
            Self::Company => &synonyms.company,
            Self::Location => &synonyms.location,
            Self::JobCategory => &synonyms.job_category,
            Self::Deadline => &synonyms.deadline,
            Self::Salary => &synonyms.salary,
            Self::DirectLink => &synonyms.direct_link,
        }
    }
}

/// Column index per role, resolved from the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub title: Option<usize>,
    pub company: Option<usize>,
    pub location: Option<usize>,
    pub job_category: Option<usize>,
    pub deadline: Option<usize>,
    pub salary: Option<usize>,
    pub direct_link: Option<usize>,
}

impl ColumnMap {
    /// Resolve roles against header texts.
    ///
    /// Synonyms are tried in order and the first one present among the
    /// headers decides the column. Comparison ignores case and surrounding
    /// whitespace.
    #[must_use]
    pub fn resolve(headers: &[String], synonyms: &HeaderSynonyms) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut map = Self::default();

        for role in ColumnRole::ALL {
            let index = role.synonyms(synonyms).iter().find_map(|synonym| {
                let synonym = synonym.trim().to_lowercase();
                normalized.iter().position(|h| *h == synonym)
            });
            *map.slot(role) = index;
        }

        map
    }

    fn slot(&mut self, role: ColumnRole) -> &mut Option<usize> {
        match role {
            ColumnRole::Title => &mut self.title,
            ColumnRole::Company => &mut self.company,
            ColumnRole::Location => &mut self.location,
            ColumnRole::JobCategory => &mut self.job_category,
            ColumnRole::Deadline => &mut self.deadline,
            ColumnRole::Salary => &mut self.salary,
            ColumnRole::DirectLink => &mut self.direct_link,
        }
    }
}

struct TableSelectors {
    table: Selector,
    row: Selector,
    header_cell: Selector,
    data_cell: Selector,
    link: Selector,
}

impl TableSelectors {
    #[allow(clippy::expect_used)] // Static selectors that are guaranteed to be valid
    fn new() -> Self {
        Self {
            table: Selector::parse("table").expect("valid selector"),
            row: Selector::parse("tr").expect("valid selector"),
            header_cell: Selector::parse("th").expect("valid selector"),
            data_cell: Selector::parse("td").expect("valid selector"),
            link: Selector::parse("a[href]").expect("valid selector"),
        }
    }
}

/// Extract listings from the first table of an HTML document.
///
/// Returns an empty list when the document has no table.
#[must_use]
pub fn extract_table(
    html: &str,
    config: &TableConfig,
    discovered_at: DateTime<FixedOffset>,
) -> Vec<ListingRecord> {
    let selectors = TableSelectors::new();
    let document = Html::parse_document(html);

    let Some(table) = document.select(&selectors.table).next() else {
        tracing::warn!("No table found in document");
        return Vec::new();
    };

    let rows: Vec<ElementRef<'_>> = table.select(&selectors.row).collect();
    let header_pos = rows
        .iter()
        .position(|row| row.select(&selectors.header_cell).next().is_some());

    let headers: Vec<String> = match header_pos {
        Some(pos) => rows[pos]
            .select(&selectors.header_cell)
            .map(element_text)
            .collect(),
        None => Vec::new(),
    };
    let columns = ColumnMap::resolve(&headers, &config.synonyms);
    tracing::debug!(?headers, ?columns, "Resolved table columns");

    let resolver = LinkResolver::new(&config.base_url);
    let today = discovered_at.date_naive();
    let data_rows = rows.iter().skip(header_pos.map_or(0, |pos| pos + 1));

    let mut listings = Vec::new();
    for row in data_rows {
        let cells: Vec<ElementRef<'_>> = row.select(&selectors.data_cell).collect();
        if cells.is_empty() {
            continue;
        }

        let cell = |index: Option<usize>| index.and_then(|i| cells.get(i).copied());
        let text = |index: Option<usize>| cell(index).map(element_text).unwrap_or_default();
        let href = |index: Option<usize>| {
            cell(index)
                .and_then(|c| c.select(&selectors.link).next())
                .and_then(|a| a.value().attr("href"))
                .map(|h| resolver.resolve(h))
                .filter(|h| !h.is_empty())
        };

        let title = cell(columns.title)
            .map(|c| match c.select(&selectors.link).next() {
                Some(anchor) => element_text(anchor),
                None => element_text(c),
            })
            .unwrap_or_default();
        let url = href(columns.title)
            .or_else(|| href(columns.direct_link))
            .unwrap_or_default();
        let deadline_raw = text(columns.deadline);

        let mut listing = ListingRecord::new(title, text(columns.company), discovered_at);
        listing.identifier = extract_identifier(&url);
        listing.location = text(columns.location);
        listing.job_category = text(columns.job_category);
        listing.deadline = resolve_deadline(&deadline_raw, today);
        listing.deadline_raw = deadline_raw;
        listing.salary_text = text(columns.salary);
        listing.url = url;
        listings.push(listing);
    }

    dedup_listings(listings)
}
