//! Telegram Markdown renderers: bold header, triple-backtick block, one line per item.

use crate::domain::bond::Bond;
use crate::time::cn_market::format_date;
use chrono::NaiveDate;

/// Reply for an empty list.
pub const EMPTY_SENTINEL: &str = "暂无相关信息";

const COMING_HEADER: &str = "*近期可转债信息:*";
const SAVED_HEADER: &str = "*已保存可转债:*";
const SUBSCRIPTION_HEADER: &str = "*打新提醒:*";
const LISTING_HEADER: &str = "*上市提醒:*";

fn render_block<I>(header: &str, lines: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = format!("{header}\n```\n");
    let mut empty = true;
    for line in lines {
        out.push_str(&line);
        out.push('\n');
        empty = false;
    }
    if empty {
        return None;
    }
    out.push_str("```");
    Some(out)
}

fn bond_line(bond: &Bond) -> String {
    format!("{} {}", bond.title, bond.start)
}

/// Upcoming events, for `/coming`.
pub fn format_coming(bonds: &[Bond]) -> String {
    render_block(COMING_HEADER, bonds.iter().map(bond_line))
        .unwrap_or_else(|| EMPTY_SENTINEL.to_string())
}

/// A chat's saved fragments, for `/list`.
pub fn format_saved(entries: &[String]) -> String {
    render_block(SAVED_HEADER, entries.iter().cloned())
        .unwrap_or_else(|| EMPTY_SENTINEL.to_string())
}

/// Subscriptions opening on `today`. Empty string when there are none.
pub fn format_subscription_digest(bonds: &[Bond], today: NaiveDate) -> String {
    let today = format_date(today);
    render_block(
        SUBSCRIPTION_HEADER,
        bonds
            .iter()
            .filter(|b| b.is_subscription() && b.start == today)
            .map(bond_line),
    )
    .unwrap_or_default()
}

/// Watchlist hits. Empty string when there are none.
pub fn format_listing_digest(matched: &[Bond]) -> String {
    render_block(LISTING_HEADER, matched.iter().map(bond_line)).unwrap_or_default()
}
