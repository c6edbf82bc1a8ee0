//! Time utilities: the user's local "today" and current month.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::month::YearMonth;

/// Calendar date of `now` in an IANA timezone like "Asia/Tokyo".
pub fn local_date(now: DateTime<Utc>, tz: &str) -> Result<NaiveDate, String> {
    let tz: Tz = tz.parse().map_err(|_| format!("invalid timezone: {tz}"))?;
    Ok(now.with_timezone(&tz).date_naive())
}

/// Month containing `now` in the given timezone.
pub fn local_month(now: DateTime<Utc>, tz: &str) -> Result<YearMonth, String> {
    local_date(now, tz).map(YearMonth::of)
}
