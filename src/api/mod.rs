//! Ranking-service HTTP client.
//!
//! Fetches player-stat and battle-ladder records per clan. Every call is
//! a fresh round trip: the client holds no response cache, and it never
//! retries on its own. Retry policy belongs to the sync orchestrator so
//! backoff decisions stay in one place.

pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::registry::ClanIdentity;
use self::rate_limit::RateGate;

/// Errors from the ranking-service client.
///
/// Credential material never appears in these messages; the clan tag is
/// carried instead so callers can attribute the failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),

    #[error("Ranking service returned HTTP {status} for clan {clan_tag}")]
    Status { status: u16, clan_tag: String },
}

impl ApiError {
    /// Whether the orchestrator should retry the failed call.
    ///
    /// Rate limiting, request timeouts and transient server errors are
    /// retryable; auth rejections, missing resources and body-decode
    /// failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            ApiError::Http(e) => e.is_timeout() || e.is_connect(),
            ApiError::InvalidUrl(_) => false,
        }
    }
}

/// Raw per-player stat block as reported by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayerStats {
    #[serde(default)]
    pub battles: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub damage_dealt: u64,
    #[serde(default)]
    pub rating: u32,
}

/// Raw roster entry as reported by the service.
///
/// Required fields are optional here; structural validation happens in
/// the reconciler so a malformed entry fails that one item, not the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayerRecord {
    pub account_id: Option<i64>,
    pub nickname: Option<String>,
    #[serde(default)]
    pub stats: Option<RawPlayerStats>,
}

/// Raw roster entry within a battle team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayerBattleEntry {
    #[serde(default)]
    pub survived: bool,
    pub player_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ship_id: i64,
    #[serde(default)]
    pub ship_level: u32,
    #[serde(default)]
    pub ship_name: String,
}

/// Raw team entry within a battle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTeamEntry {
    #[serde(default)]
    pub result: Option<String>,
    pub clan_id: Option<i64>,
    pub team_number: Option<u32>,
    pub division_rating: Option<u32>,
    #[serde(default)]
    pub players: Vec<RawPlayerBattleEntry>,
}

/// Raw ladder battle as reported by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBattleRecord {
    pub id: Option<i64>,
    #[serde(default)]
    pub cluster_id: Option<i64>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub map_id: Option<i64>,
    #[serde(default)]
    pub arena_id: Option<i64>,
    #[serde(default)]
    pub teams: Vec<RawTeamEntry>,
}

/// Server-side filter for battle fetches.
#[derive(Debug, Clone, Default)]
pub struct BattleFilter {
    /// Restrict to battles fought on one team side
    pub team_side: Option<u32>,
}

impl BattleFilter {
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(side) = self.team_side {
            params.push(("team", side.to_string()));
        }
        params
    }
}

/// Seam over the ranking service, mockable in tests.
#[async_trait]
pub trait RankingApi: Send + Sync {
    /// Fetch the full player roster for a clan.
    async fn fetch_players(&self, clan: &ClanIdentity) -> Result<Vec<RawPlayerRecord>, ApiError>;

    /// Fetch the clan's battle history, optionally filtered.
    async fn fetch_battles(
        &self,
        clan: &ClanIdentity,
        filter: &BattleFilter,
    ) -> Result<Vec<RawBattleRecord>, ApiError>;
}

/// Pagination envelope used by the service's list endpoints.
#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default)]
    meta: PageMeta,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page")]
    page_count: u32,
}

fn default_page() -> u32 {
    1
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            page: 1,
            page_count: 1,
        }
    }
}

/// HTTP implementation of [`RankingApi`].
pub struct HttpRankingApi {
    client: Client,
    base_url: Url,
    page_size: u32,
    gate: RateGate,
}

impl HttpRankingApi {
    /// Build the client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("clan-sync/0.1.0")),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()?;

        // Url::join treats a base without a trailing slash as a file,
        // dropping its last path segment.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            page_size: config.page_size,
            gate: RateGate::new(Duration::from_millis(config.rate_limit_ms)),
        })
    }

    /// Walk a paginated endpoint to exhaustion, concatenating pages.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        clan: &ClanIdentity,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            self.gate.wait(clan.clan_id).await;

            debug!(clan = %clan.tag, page, "requesting {}", path);

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(clan.credential.expose())
                .query(&[("page", page.to_string()), ("page_size", self.page_size.to_string())])
                .query(extra)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    clan_tag: clan.tag.clone(),
                });
            }

            let body: Paged<T> = response.json().await?;
            debug!(clan = %clan.tag, page = body.meta.page, page_count = body.meta.page_count, "page received");
            items.extend(body.data);

            if page >= body.meta.page_count {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl RankingApi for HttpRankingApi {
    async fn fetch_players(&self, clan: &ClanIdentity) -> Result<Vec<RawPlayerRecord>, ApiError> {
        self.get_paged(clan, &format!("clans/{}/players", clan.clan_id), &[])
            .await
    }

    async fn fetch_battles(
        &self,
        clan: &ClanIdentity,
        filter: &BattleFilter,
    ) -> Result<Vec<RawBattleRecord>, ApiError> {
        self.get_paged(
            clan,
            &format!("clans/{}/battles", clan.clan_id),
            &filter.query_params(),
        )
        .await
    }
}
