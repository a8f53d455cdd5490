#[macro_use]
extern crate log;

pub mod bangumi;
pub use bangumi::Bangumi;

pub mod error;
pub use error::{AuthError, DecodeError, Error, ErrorKind};

pub mod http;
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};

pub use oauth2::url::Url;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: String,
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub created_at: i64,
}

impl Token {
    pub fn expires_at(&self) -> i64 {
        self.created_at + self.expires_in
    }

    pub fn is_expired(&self) -> bool {
        self.expires_in > 0 && Utc::now().timestamp() >= self.expires_at() - EXPIRY_LEEWAY_SECS
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    #[default]
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Watching => "watching",
            TrackStatus::Completed => "completed",
            TrackStatus::OnHold => "on_hold",
            TrackStatus::Dropped => "dropped",
            TrackStatus::PlanToWatch => "plan_to_watch",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watching" => Ok(TrackStatus::Watching),
            "completed" => Ok(TrackStatus::Completed),
            "on_hold" => Ok(TrackStatus::OnHold),
            "dropped" => Ok(TrackStatus::Dropped),
            "plan_to_watch" => Ok(TrackStatus::PlanToWatch),
            _ => Err(format!("unknown track status: {s}")),
        }
    }
}

/// One user's progress on one remote entry.
///
/// `score` and `last_episode_seen` are fractional locally; services that only
/// accept integers receive the truncated value.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub media_id: i64,
    pub title: String,
    pub score: f64,
    pub last_episode_seen: f64,
    pub total_episodes: i64,
    pub status: TrackStatus,
    pub tracking_url: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub media_id: i64,
    pub title: String,
    pub cover_url: String,
    pub summary: String,
    pub tracking_url: String,
    pub total_episodes: i64,
}

impl SearchResult {
    /// Adopt this result as a new record with the user's initial selection.
    pub fn into_record(self, status: TrackStatus) -> TrackRecord {
        TrackRecord {
            media_id: self.media_id,
            title: self.title,
            score: 0.0,
            last_episode_seen: 0.0,
            total_episodes: self.total_episodes,
            status,
            tracking_url: self.tracking_url,
        }
    }
}

#[async_trait]
pub trait Tracker: Send + Sync {
    fn name(&self) -> &'static str;

    fn authorize_url(&self) -> Url;

    async fn exchange_code(&self, code: String) -> Result<Token, AuthError>;

    async fn refresh_token(&self, token: &Token) -> Result<Token, AuthError>;

    async fn search(&self, token: &str, query: &str) -> Result<Vec<SearchResult>, Error>;

    async fn get_subject(&self, token: &str, media_id: i64) -> Result<SearchResult, Error>;

    async fn add(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error>;

    /// Not atomic on services with split writes, see [`Error::PartialUpdate`].
    async fn update(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error>;

    /// `None` means the entry is not in the user's list.
    async fn fetch_status(
        &self,
        token: &str,
        record: TrackRecord,
    ) -> Result<Option<TrackRecord>, Error>;
}
