use thiserror::Error;

/// Failures surfaced by the cache, dispatcher and notifier.
#[derive(Debug, Error)]
pub enum BondError {
    /// Key-value store or bot API unreachable.
    #[error("{target} unavailable: {source:#}")]
    Connect {
        target: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Upstream market-data endpoint unreachable or answered with a non-success status.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Malformed JSON from upstream or from the cache.
    #[error("decode failed ({stage}): {source}")]
    Decode {
        stage: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Bonds were requested before the first successful fetch.
    #[error("no bond data cached yet")]
    CacheMiss,
}

impl BondError {
    pub fn store(source: anyhow::Error) -> Self {
        Self::Connect {
            target: "key-value store",
            source,
        }
    }

    pub fn bot(source: anyhow::Error) -> Self {
        Self::Connect {
            target: "bot API",
            source,
        }
    }
}

pub type BondResult<T> = Result<T, BondError>;
