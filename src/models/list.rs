//! List filtering types
//!
//! Query parameters shared by the patient and therapist listings, plus the
//! string-or-array list type used by patient payloads.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Relative creation-date window accepted by `group_by_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Last2Days,
    Last3Months,
    Last6Months,
}

impl DateRange {
    /// Lower bound (inclusive) of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRange::Last2Days => now - Duration::days(2),
            DateRange::Last3Months => now.checked_sub_months(Months::new(3)).unwrap_or(now),
            DateRange::Last6Months => now.checked_sub_months(Months::new(6)).unwrap_or(now),
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_2_days" => Ok(DateRange::Last2Days),
            "last_3_months" => Ok(DateRange::Last3Months),
            "last_6_months" => Ok(DateRange::Last6Months),
            _ => Err(format!("Unknown date range: {}", s)),
        }
    }
}

/// Filter for paged listings.
///
/// A `limit` of `None` (or any non-positive value) returns every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub limit: Option<i64>,
    pub offset: i64,
    pub keyword: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl ListFilter {
    /// Limit to bind into `LIMIT ?`.
    pub fn sql_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => i64::MAX,
        }
    }

    /// Offset to bind into `OFFSET ?`.
    pub fn sql_offset(&self) -> i64 {
        self.offset.max(0)
    }

    /// Keyword, or an empty string when no keyword filter applies.
    pub fn keyword(&self) -> &str {
        self.keyword.as_deref().map(str::trim).unwrap_or("")
    }

    /// `LIKE` pattern matching the keyword anywhere in a column.
    pub fn like_pattern(&self) -> String {
        format!("%{}%", self.keyword())
    }
}

/// List of strings accepted either as a JSON array or a single string.
///
/// Stored comma-joined in a single column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringList(pub Vec<String>);

impl StringList {
    /// True when no entry carries any text
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|item| item.trim().is_empty())
    }

    /// Comma-joined storage form
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<Vec<String>> for StringList {
    fn from(items: Vec<String>) -> Self {
        StringList(items)
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(item) if item.is_empty() => StringList(Vec::new()),
            Raw::One(item) => StringList(vec![item]),
            Raw::Many(items) => StringList(items),
        })
    }
}
