//! HTTP client for the inventory service: machine roster and per-machine records.
//!
//! The two fetches retry differently. Nothing can run without a roster, so
//! [`InventoryClient::fetch_roster`] retries forever. A single machine is
//! expendable, so [`InventoryClient::fetch_records`] gives up after the
//! attempt ceiling and the machine is skipped for the cycle.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::error::{FleetError, Result};
use crate::types::{MachineAlias, MetricRecord, Roster};

pub const ROSTER_PATH: [&str; 2] = ["dados", "maquinas"];
pub const DEFAULT_RECORD_CAP: usize = 360;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Ceiling for one machine's record fetch.
    pub max_attempts: u32,
    /// Pause between two record fetch attempts.
    pub delay: Duration,
    /// Pause between roster attempts (no ceiling).
    pub roster_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
            roster_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: reqwest::Client,
    base: Url,
    retry: RetryPolicy,
    record_cap: usize,
}

impl InventoryClient {
    pub fn new(base: Url, retry: RetryPolicy, record_cap: usize) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(FleetError::Config(format!("inventory url {base} cannot take a path")));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|source| FleetError::Transport {
                url: base.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base,
            retry,
            record_cap,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in new(): base URLs always accept path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_body(&self, url: &Url) -> Result<String> {
        let transport = |source| FleetError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;
        resp.text().await.map_err(transport)
    }

    /// One roster request, no retry.
    pub async fn try_fetch_roster(&self) -> Result<Vec<MachineAlias>> {
        let url = self.endpoint(&ROSTER_PATH);
        let body = self.get_body(&url).await?;
        let roster: Roster = serde_json::from_str(&body).map_err(|source| FleetError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(roster.machine_aliases)
    }

    /// Blocks until the inventory hands out a roster.
    pub async fn fetch_roster(&self) -> Vec<MachineAlias> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.try_fetch_roster().await {
                Ok(aliases) => {
                    info!(machines = aliases.len(), "roster obtained");
                    return aliases;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "roster unavailable, retrying");
                    sleep(self.retry.roster_delay).await;
                }
            }
        }
    }

    /// One records request, no retry. Empty or `null` bodies are
    /// [`FleetError::EmptyData`]. The result is capped to the newest
    /// `record_cap` records.
    pub async fn try_fetch_records(&self, alias: &str) -> Result<Vec<MetricRecord>> {
        let url = self.endpoint(&[alias]);
        let body = self.get_body(&url).await?;
        if body.trim().is_empty() {
            return Err(FleetError::EmptyData {
                alias: alias.to_string(),
            });
        }
        let records: Option<Vec<MetricRecord>> =
            serde_json::from_str(&body).map_err(|source| FleetError::Decode {
                url: url.to_string(),
                source,
            })?;
        let mut records = records.unwrap_or_default();
        if records.is_empty() {
            return Err(FleetError::EmptyData {
                alias: alias.to_string(),
            });
        }
        records.truncate(self.record_cap);
        Ok(records)
    }

    /// Records for `alias`, newest first. Returns an empty vec once the
    /// attempt ceiling is exhausted.
    pub async fn fetch_records(&self, alias: &str) -> Vec<MetricRecord> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.try_fetch_records(alias).await {
                Ok(records) => {
                    info!(
                        alias,
                        records = records.len(),
                        newest = %records[0].timestamp_coleta,
                        "records obtained"
                    );
                    return records;
                }
                Err(e) => {
                    warn!(alias, attempt, max_attempts, error = %e, "record fetch failed");
                    if attempt < max_attempts {
                        sleep(self.retry.delay).await;
                    }
                }
            }
        }
        warn!(alias, max_attempts, "skipping machine this cycle");
        Vec::new()
    }
}
