use animiru_tracker::{SearchResult, TrackRecord, Url};
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::tracker::{Token, TrackedAnime};

#[derive(Debug, Error)]
pub enum TrackerRepositoryError {
    #[error("tracker not available")]
    NoTracker,
    #[error("not logged in to tracker")]
    NotLoggedIn,
    #[error("database return error: {0}")]
    DbError(#[from] sqlx::Error),
    #[error("tracker error: {0}")]
    TrackerError(#[from] animiru_tracker::Error),
}

impl From<animiru_tracker::AuthError> for TrackerRepositoryError {
    fn from(e: animiru_tracker::AuthError) -> Self {
        TrackerRepositoryError::TrackerError(e.into())
    }
}

impl TrackerRepositoryError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TrackerRepositoryError::TrackerError(e) if e.is_unauthorized())
    }
}

#[async_trait]
pub trait TrackerRepository: Send + Sync {
    fn get_authorize_url(&self, tracker: &str) -> Result<Url, TrackerRepositoryError>;

    async fn exchange_code(
        &self,
        tracker: &str,
        code: String,
    ) -> Result<Token, TrackerRepositoryError>;

    async fn refresh_token(
        &self,
        tracker: &str,
        token: &Token,
    ) -> Result<Token, TrackerRepositoryError>;

    async fn insert_tracker_credential(
        &self,
        tracker: &str,
        token: &Token,
    ) -> Result<(), TrackerRepositoryError>;

    async fn get_tracker_token(&self, tracker: &str) -> Result<Token, TrackerRepositoryError>;

    async fn delete_tracker_credential(&self, tracker: &str)
    -> Result<u64, TrackerRepositoryError>;

    async fn search_anime(
        &self,
        token: &str,
        tracker: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, TrackerRepositoryError>;

    async fn fetch_anime_details(
        &self,
        token: &str,
        tracker: &str,
        media_id: i64,
    ) -> Result<SearchResult, TrackerRepositoryError>;

    async fn add_tracking(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<TrackRecord, TrackerRepositoryError>;

    async fn update_tracking(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<TrackRecord, TrackerRepositoryError>;

    async fn fetch_tracking_status(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<Option<TrackRecord>, TrackerRepositoryError>;

    async fn get_tracked_anime(
        &self,
        anime_id: i64,
    ) -> Result<Vec<TrackedAnime>, TrackerRepositoryError>;

    async fn upsert_tracked_anime(
        &self,
        anime_id: i64,
        tracker: &str,
        record: &TrackRecord,
    ) -> Result<(), TrackerRepositoryError>;

    async fn delete_tracked_anime(
        &self,
        anime_id: i64,
        tracker: &str,
    ) -> Result<u64, TrackerRepositoryError>;
}
