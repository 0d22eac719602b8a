//! Sales dataset model
//!
//! Records are loaded once at startup and never mutated. The engine holds
//! them behind an `Arc` slice so snapshots and worker threads can share the
//! collection without copying rows.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Fiscal quarter a deal is booked under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Canonical wire spelling, matching what the agent sends in filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health classification of a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Good,
    Warning,
    Critical,
}

impl DealStatus {
    /// Canonical wire spelling, matching what the agent sends in filters
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Good => "good",
            DealStatus::Warning => "warning",
            DealStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sales deal
///
/// `revenue` and `target` are whole currency units. `deal_count` is the
/// number of individual line items rolled into this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    pub id: String,
    pub region: String,
    pub product: String,
    pub quarter: Quarter,
    pub revenue: i64,
    pub target: i64,
    pub status: DealStatus,
    pub deal_count: u32,
    pub rep: String,
    pub close_date: NaiveDate,
}

impl SalesRecord {
    /// English month name the deal closed in, e.g. "March"
    pub fn close_month(&self) -> &'static str {
        month_name(self.close_date.month())
    }
}

pub(crate) fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

/// Immutable collection of sales records shared across the engine
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Arc<[SalesRecord]>,
}

impl Dataset {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load records from a JSON array on disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<SalesRecord> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::DatasetError(format!("invalid dataset JSON: {}", e)))?;
        if records.is_empty() {
            return Err(EngineError::DatasetError(
                "dataset contains no records".to_string(),
            ));
        }
        Ok(Self::new(records))
    }

    /// Built-in deterministic dataset used by the demo binary and tests
    ///
    /// Covers every region, product and quarter so any filter the agent can
    /// express has at least one matching row. The generation formula is
    /// fixed so assertions on totals stay stable.
    pub fn demo() -> Self {
        const REGIONS: [&str; 4] = ["US-East", "US-West", "EU-Central", "APAC"];
        const PRODUCTS: [&str; 4] = [
            "Orion Suite",
            "Pulse CRM",
            "Atlas Analytics",
            "Nimbus Cloud",
        ];
        const REPS: [[&str; 2]; 4] = [
            ["Dana Reyes", "Marcus Cole"],
            ["Priya Shah", "Tom Alvarez"],
            ["Lena Fischer", "Marco Bianchi"],
            ["Yuki Tanaka", "Arjun Mehta"],
        ];

        let mut records = Vec::with_capacity(32);
        let mut id = 0u32;
        for (ri, region) in REGIONS.iter().enumerate() {
            for (pi, product) in PRODUCTS.iter().enumerate() {
                // Two quarters per region/product pair keeps the set compact
                // while still populating all four quarters overall.
                for qi in [(ri + pi) % 4, (ri + pi + 2) % 4] {
                    id += 1;
                    let revenue = 40_000
                        + 7_000 * ri as i64
                        + 11_000 * pi as i64
                        + 9_000 * qi as i64;
                    let target = 52_000
                        + 6_000 * ((ri + pi + qi) % 4) as i64
                        + 5_000 * qi as i64;
                    let status = if revenue * 100 >= target * 95 {
                        DealStatus::Good
                    } else if revenue * 100 >= target * 75 {
                        DealStatus::Warning
                    } else {
                        DealStatus::Critical
                    };
                    let month = 3 * qi as u32 + (pi as u32 % 3) + 1;
                    let day = (5 + 4 * ri as u32 + 2 * pi as u32).min(28);
                    // Valid by construction: month is 1..=12, day is 5..=28
                    let close_date = NaiveDate::from_ymd_opt(2025, month, day).unwrap_or_default();
                    records.push(SalesRecord {
                        id: format!("D-{:03}", id),
                        region: region.to_string(),
                        product: product.to_string(),
                        quarter: Quarter::ALL[qi],
                        revenue,
                        target,
                        status,
                        deal_count: 3 + ((ri + pi + qi) % 5) as u32,
                        rep: REPS[ri][pi % 2].to_string(),
                        close_date,
                    });
                }
            }
        }
        Self::new(records)
    }
}
