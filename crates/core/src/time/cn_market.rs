use chrono::{DateTime, NaiveDate, Utc};

const CST_OFFSET_SECS: i32 = 8 * 3600;

/// Calendar date in China Standard Time (UTC+8), which the upstream calendar uses.
pub fn today(now_utc: DateTime<Utc>) -> NaiveDate {
    match chrono::FixedOffset::east_opt(CST_OFFSET_SECS) {
        Some(cst) => now_utc.with_timezone(&cst).date_naive(),
        None => now_utc.date_naive(),
    }
}

/// Formats a date the way the upstream calendar encodes `start`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
