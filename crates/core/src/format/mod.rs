pub mod digest;
pub mod matcher;

pub use digest::{
    format_coming, format_listing_digest, format_saved, format_subscription_digest, EMPTY_SENTINEL,
};
pub use matcher::{fragment_matches, match_watchlist};
