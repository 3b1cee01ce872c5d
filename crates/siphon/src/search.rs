//! Item listing with filters and pagination.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

use crate::store::{ItemStore, Result};

pub use crate::store::{DEFAULT_LIST_LIMIT, ItemFilter, ItemPage, Pagination};

/// List items matching `filter`, newest published first.
pub async fn search(
    store: &dyn ItemStore,
    filter: &ItemFilter,
    pagination: Pagination,
) -> Result<ItemPage> {
    let page = store.list_filtered(filter, pagination).await?;
    tracing::debug!(
        total = page.total,
        returned = page.items.len(),
        offset = page.offset,
        "Listed items"
    );
    Ok(page)
}

/// A `--published-since` value that could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid time filter '{input}': expected <n>h, <n>d, <n>w, YYYY-MM-DD or RFC 3339")]
pub struct TimeFilterError {
    pub input: String,
}

/// Parse a relative (`12h`, `7d`, `2w`) or absolute (`2025-01-31`,
/// RFC 3339) time, relative values counted back from `now`.
pub fn parse_since(
    input: &str,
    now: DateTime<Utc>,
) -> std::result::Result<DateTime<Utc>, TimeFilterError> {
    let input = input.trim();
    let err = || TimeFilterError {
        input: input.to_string(),
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(err);
    }

    let unit = input.chars().last().ok_or_else(err)?;
    let amount: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| err())?;
    if amount < 0 {
        return Err(err());
    }
    let span = match unit.to_ascii_lowercase() {
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        'w' => Duration::try_weeks(amount),
        _ => None,
    }
    .ok_or_else(err)?;
    now.checked_sub_signed(span).ok_or_else(err)
}
