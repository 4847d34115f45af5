use serde::{Deserialize, Serialize};

/// Title marker for listing-day events.
pub const LISTING_MARKER: &str = "上市日";

/// Title marker for subscription-day events.
pub const SUBSCRIPTION_MARKER: &str = "申购日";

/// One upcoming convertible-bond calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub id: String,
    pub code: String,
    pub title: String,
    /// Event date as `YYYY-MM-DD`.
    pub start: String,
}

impl Bond {
    pub fn is_listing(&self) -> bool {
        self.title.contains(LISTING_MARKER)
    }

    pub fn is_subscription(&self) -> bool {
        self.title.contains(SUBSCRIPTION_MARKER)
    }

    pub fn is_event(&self) -> bool {
        self.is_listing() || self.is_subscription()
    }
}
