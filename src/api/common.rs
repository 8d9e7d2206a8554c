//! Common API utilities and shared types
//!
//! Listing query parameters and extractor wrappers that report rejections
//! through the error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::middleware::ApiError;
use crate::models::{DateRange, ListFilter};

/// JSON body whose rejection is rendered as an [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejection is rendered as an [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejection is rendered as an [`ApiError`]
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// Listing Query
// ============================================================================

/// Listing query parameters.
///
/// Parsed leniently: numbers that do not parse count as absent and an
/// unknown `group_by_date` applies no date window.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub group_by_date: Option<String>,
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

impl ListQuery {
    pub fn limit(&self) -> Option<i64> {
        parse_number(self.limit.as_deref())
    }

    pub fn offset(&self) -> Option<i64> {
        parse_number(self.offset.as_deref())
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.group_by_date
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
    }

    /// Build the repository filter, resolving the date window against `now`.
    pub fn to_filter(&self, now: DateTime<Utc>) -> ListFilter {
        ListFilter {
            limit: self.limit().filter(|l| *l > 0),
            offset: self.offset().unwrap_or(0).max(0),
            keyword: self
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            created_since: self.date_range().map(|range| range.since(now)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn query(limit: &str, offset: &str, keyword: &str, group: &str) -> ListQuery {
        let opt = |v: &str| (!v.is_empty()).then(|| v.to_string());
        ListQuery {
            limit: opt(limit),
            offset: opt(offset),
            keyword: opt(keyword),
            group_by_date: opt(group),
        }
    }

    #[test]
    fn test_empty_query_lists_everything() {
        let now = Utc::now();
        assert_eq!(ListQuery::default().to_filter(now), ListFilter::default());
    }

    #[test]
    fn test_numbers_are_parsed_leniently() {
        let now = Utc::now();
        let filter = query("5", "10", "", "").to_filter(now);
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.offset, 10);

        let filter = query("abc", "-3", "", "").to_filter(now);
        assert_eq!(filter.limit, None);
        assert_eq!(filter.offset, 0);

        let filter = query("0", "", "", "").to_filter(now);
        assert_eq!(filter.limit, None);
    }

    #[test]
    fn test_keyword_is_trimmed() {
        let now = Utc::now();
        assert_eq!(
            query("", "", "  budi ", "").to_filter(now).keyword,
            Some("budi".to_string())
        );
        assert_eq!(query("", "", "   ", "").to_filter(now).keyword, None);
    }

    #[test]
    fn test_group_by_date() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();

        let filter = query("", "", "", "last_2_days").to_filter(now);
        assert_eq!(filter.created_since, Some(now - Duration::days(2)));

        let filter = query("", "", "", "last_3_months").to_filter(now);
        assert_eq!(
            filter.created_since,
            Some(Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap())
        );

        let filter = query("", "", "", "last_week").to_filter(now);
        assert_eq!(filter.created_since, None);
    }
}
