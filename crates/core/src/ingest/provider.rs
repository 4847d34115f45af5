use crate::config::Settings;
use crate::domain::bond::Bond;
use crate::error::{BondError, BondResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Upstream source of upcoming bond calendar events.
#[async_trait::async_trait]
pub trait BondSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_calendar(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> BondResult<Vec<Bond>>;
}

#[derive(Debug, Clone)]
pub struct JisiluClient {
    http: reqwest::Client,
    url: String,
}

impl JisiluClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.upstream_timeout_secs))
            .build()
            .context("failed to build jisilu http client")?;

        Ok(Self {
            http,
            url: settings.jisilu_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl BondSource for JisiluClient {
    fn source_name(&self) -> &'static str {
        "jisilu"
    }

    async fn fetch_calendar(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BondResult<Vec<Bond>> {
        let res = self
            .http
            .get(&self.url)
            .query(&[
                ("start", start.timestamp().to_string()),
                ("end", end.timestamp().to_string()),
            ])
            .send()
            .await
            .map_err(|e| BondError::Fetch(format!("call jisilu failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(BondError::Fetch(format!("jisilu HTTP {status}")));
        }

        let text = res
            .text()
            .await
            .map_err(|e| BondError::Fetch(format!("failed to read jisilu response: {e}")))?;

        decode_calendar(&text)
    }
}

pub fn decode_calendar(text: &str) -> BondResult<Vec<Bond>> {
    serde_json::from_str::<Vec<Bond>>(text).map_err(|source| BondError::Decode {
        stage: "upstream",
        source,
    })
}
