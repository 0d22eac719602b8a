//! Aggregate context derived from the filtered view
//!
//! The summary is what the voice agent "sees": totals, rankings and the
//! active filters, recomputed from scratch on every state change. All
//! aggregation here is pure; the sync scheduler decides when a summary is
//! actually worth pushing.

use std::fmt;

use serde::Serialize;

use crate::data::SalesRecord;
use crate::filter::{Dimension, FilterState};
use crate::history::HistoryStack;

/// Rankings never include more reps than this
pub const TOP_REP_LIMIT: usize = 5;

/// Aggregated standing of one region within the filtered view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStanding {
    pub region: String,
    pub revenue: i64,
    pub target: i64,
    pub performance_pct: u32,
}

/// Aggregated standing of one product within the filtered view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRollup {
    pub product: String,
    pub revenue: i64,
    pub deal_count: u32,
    pub record_count: usize,
}

/// Aggregated standing of one sales rep within the filtered view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepStanding {
    pub rep: String,
    pub revenue: i64,
    pub deal_count: u32,
}

/// How many records fall into each deal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub good: usize,
    pub warning: usize,
    pub critical: usize,
}

/// Everything the agent needs to answer questions about the current view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub record_count: usize,
    pub total_revenue: i64,
    pub total_target: i64,
    pub performance_pct: u32,
    pub status_counts: StatusCounts,
    pub region_rankings: Vec<RegionStanding>,
    pub product_rollups: Vec<ProductRollup>,
    pub top_reps: Vec<RepStanding>,
    pub best_region: Option<String>,
    pub worst_region: Option<String>,
    pub active_filters: FilterState,
    pub can_undo: bool,
}

/// Build the full summary for the records matching the active filters
///
/// Rankings use stable ordering: groups that compare equal keep the order
/// in which they first appear in the dataset, so repeated runs over the
/// same data serialize identically.
pub fn summarize(
    records: &[SalesRecord],
    filter: &FilterState,
    history: &HistoryStack,
) -> ContextSummary {
    let matched: Vec<&SalesRecord> = records.iter().filter(|r| filter.matches(r)).collect();

    let total_revenue: i64 = matched.iter().map(|r| r.revenue).sum();
    let total_target: i64 = matched.iter().map(|r| r.target).sum();

    let mut status_counts = StatusCounts::default();
    for record in &matched {
        match record.status {
            crate::data::DealStatus::Good => status_counts.good += 1,
            crate::data::DealStatus::Warning => status_counts.warning += 1,
            crate::data::DealStatus::Critical => status_counts.critical += 1,
        }
    }

    let mut region_rankings = roll_up_regions(&matched);
    region_rankings.sort_by(|a, b| {
        ratio(b.revenue, b.target)
            .partial_cmp(&ratio(a.revenue, a.target))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut product_rollups = roll_up_products(&matched);
    product_rollups.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let mut top_reps = roll_up_reps(&matched);
    top_reps.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_reps.truncate(TOP_REP_LIMIT);

    let best_region = region_rankings.first().map(|r| r.region.clone());
    let worst_region = region_rankings.last().map(|r| r.region.clone());

    ContextSummary {
        record_count: matched.len(),
        total_revenue,
        total_target,
        performance_pct: performance_pct(total_revenue, total_target),
        status_counts,
        region_rankings,
        product_rollups,
        top_reps,
        best_region,
        worst_region,
        active_filters: filter.clone(),
        can_undo: history.can_undo(),
    }
}

/// Revenue attainment as a rounded whole percentage
///
/// A zero or negative target reports 0 rather than dividing by zero.
pub(crate) fn performance_pct(revenue: i64, target: i64) -> u32 {
    if target <= 0 {
        return 0;
    }
    let pct = (revenue as f64 / target as f64) * 100.0;
    if pct <= 0.0 {
        0
    } else {
        pct.round() as u32
    }
}

fn ratio(revenue: i64, target: i64) -> f64 {
    if target <= 0 {
        0.0
    } else {
        revenue as f64 / target as f64
    }
}

fn roll_up_regions(matched: &[&SalesRecord]) -> Vec<RegionStanding> {
    let mut rollups: Vec<RegionStanding> = Vec::new();
    for record in matched {
        match rollups.iter_mut().find(|r| r.region == record.region) {
            Some(entry) => {
                entry.revenue += record.revenue;
                entry.target += record.target;
            }
            None => rollups.push(RegionStanding {
                region: record.region.clone(),
                revenue: record.revenue,
                target: record.target,
                performance_pct: 0,
            }),
        }
    }
    for entry in &mut rollups {
        entry.performance_pct = performance_pct(entry.revenue, entry.target);
    }
    rollups
}

fn roll_up_products(matched: &[&SalesRecord]) -> Vec<ProductRollup> {
    let mut rollups: Vec<ProductRollup> = Vec::new();
    for record in matched {
        match rollups.iter_mut().find(|r| r.product == record.product) {
            Some(entry) => {
                entry.revenue += record.revenue;
                entry.deal_count += record.deal_count;
                entry.record_count += 1;
            }
            None => rollups.push(ProductRollup {
                product: record.product.clone(),
                revenue: record.revenue,
                deal_count: record.deal_count,
                record_count: 1,
            }),
        }
    }
    rollups
}

fn roll_up_reps(matched: &[&SalesRecord]) -> Vec<RepStanding> {
    let mut rollups: Vec<RepStanding> = Vec::new();
    for record in matched {
        match rollups.iter_mut().find(|r| r.rep == record.rep) {
            Some(entry) => {
                entry.revenue += record.revenue;
                entry.deal_count += record.deal_count;
            }
            None => rollups.push(RepStanding {
                rep: record.rep.clone(),
                revenue: record.revenue,
                deal_count: record.deal_count,
            }),
        }
    }
    rollups
}

/// UI annotation for the most recently touched filter dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub dimension: Dimension,
    pub value: String,
    /// Every active constraint spelled out, e.g. "region: US-East, quarter: Q1"
    pub label: String,
    pub record_count: usize,
    pub deal_count: u32,
    pub revenue: i64,
    pub revenue_compact: String,
    pub performance_pct: u32,
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} records, {} deals): {} revenue, {}% to target",
            self.label,
            self.record_count,
            self.deal_count,
            self.revenue_compact,
            self.performance_pct
        )
    }
}

/// Derive the insight for the current view, if one applies
///
/// Returns `None` only when no filters are active. Aggregates cover the
/// records matching the whole filter state, not just the highlighted
/// dimension.
pub fn derive_insight(records: &[SalesRecord], filter: &FilterState) -> Option<Insight> {
    let (dimension, value) = filter.last_touched()?;
    let matched: Vec<&SalesRecord> = records.iter().filter(|r| filter.matches(r)).collect();

    let revenue: i64 = matched.iter().map(|r| r.revenue).sum();
    let target: i64 = matched.iter().map(|r| r.target).sum();
    let deal_count: u32 = matched.iter().map(|r| r.deal_count).sum();

    Some(Insight {
        dimension,
        value: value.to_string(),
        label: filter.label(),
        record_count: matched.len(),
        deal_count,
        revenue,
        revenue_compact: compact_currency(revenue),
        performance_pct: performance_pct(revenue, target),
    })
}

/// Compact currency formatting: $1.2M, $150K, $75
pub(crate) fn compact_currency(amount: i64) -> String {
    let negative = amount < 0;
    let magnitude = amount.unsigned_abs();
    let formatted = if magnitude >= 1_000_000 {
        format!("${:.1}M", magnitude as f64 / 1_000_000.0)
    } else if magnitude >= 1_000 {
        format!("${}K", (magnitude as f64 / 1_000.0).round() as u64)
    } else {
        format!("${}", magnitude)
    };
    if negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}
