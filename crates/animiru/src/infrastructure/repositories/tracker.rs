use std::collections::HashMap;

use animiru_tracker::{SearchResult, TrackRecord, TrackStatus, Tracker, Url};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::domain::{
    entities::tracker::{Token, TrackedAnime},
    repositories::tracker::{TrackerRepository, TrackerRepositoryError},
};

pub struct TrackerRepositoryImpl {
    pool: SqlitePool,
    clients: HashMap<&'static str, Box<dyn Tracker>>,
}

impl TrackerRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clients: HashMap::new(),
        }
    }

    pub fn register<T: Tracker + 'static>(mut self, tracker: T) -> Self {
        self.clients.insert(tracker.name(), Box::new(tracker));
        self
    }

    fn client(&self, tracker: &str) -> Result<&dyn Tracker, TrackerRepositoryError> {
        self.clients
            .get(tracker)
            .map(|client| client.as_ref())
            .ok_or(TrackerRepositoryError::NoTracker)
    }
}

fn tracked_anime(row: &SqliteRow) -> TrackedAnime {
    let status: String = row.get(7);
    TrackedAnime {
        anime_id: row.get(0),
        tracker: row.get(1),
        record: TrackRecord {
            media_id: row.get(2),
            title: row.get(3),
            score: row.get(4),
            last_episode_seen: row.get(5),
            total_episodes: row.get(6),
            status: status.parse().unwrap_or_else(|e| {
                warn!("{e}");
                TrackStatus::default()
            }),
            tracking_url: row.get(8),
        },
    }
}

#[async_trait]
impl TrackerRepository for TrackerRepositoryImpl {
    fn get_authorize_url(&self, tracker: &str) -> Result<Url, TrackerRepositoryError> {
        Ok(self.client(tracker)?.authorize_url())
    }

    async fn exchange_code(
        &self,
        tracker: &str,
        code: String,
    ) -> Result<Token, TrackerRepositoryError> {
        Ok(self.client(tracker)?.exchange_code(code).await?)
    }

    async fn refresh_token(
        &self,
        tracker: &str,
        token: &Token,
    ) -> Result<Token, TrackerRepositoryError> {
        Ok(self.client(tracker)?.refresh_token(token).await?)
    }

    async fn insert_tracker_credential(
        &self,
        tracker: &str,
        token: &Token,
    ) -> Result<(), TrackerRepositoryError> {
        sqlx::query(
            r#"INSERT INTO tracker_credential(
                tracker,
                token_type,
                access_token,
                refresh_token,
                expires_in,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(tracker) DO UPDATE SET
            token_type = excluded.token_type,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_in = excluded.expires_in,
            created_at = excluded.created_at"#,
        )
        .bind(tracker)
        .bind(&token.token_type)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_in)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_tracker_token(&self, tracker: &str) -> Result<Token, TrackerRepositoryError> {
        let row = sqlx::query(
            r#"SELECT token_type, access_token, refresh_token, expires_in, created_at
            FROM tracker_credential WHERE tracker = ?"#,
        )
        .bind(tracker)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TrackerRepositoryError::NotLoggedIn)?;

        Ok(Token {
            token_type: row.get(0),
            access_token: row.get(1),
            refresh_token: row.get(2),
            expires_in: row.get(3),
            created_at: row.get(4),
        })
    }

    async fn delete_tracker_credential(
        &self,
        tracker: &str,
    ) -> Result<u64, TrackerRepositoryError> {
        Ok(
            sqlx::query("DELETE FROM tracker_credential WHERE tracker = ?")
                .bind(tracker)
                .execute(&self.pool)
                .await?
                .rows_affected(),
        )
    }

    async fn search_anime(
        &self,
        token: &str,
        tracker: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, TrackerRepositoryError> {
        Ok(self.client(tracker)?.search(token, query).await?)
    }

    async fn fetch_anime_details(
        &self,
        token: &str,
        tracker: &str,
        media_id: i64,
    ) -> Result<SearchResult, TrackerRepositoryError> {
        Ok(self.client(tracker)?.get_subject(token, media_id).await?)
    }

    async fn add_tracking(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<TrackRecord, TrackerRepositoryError> {
        Ok(self.client(tracker)?.add(token, record).await?)
    }

    async fn update_tracking(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<TrackRecord, TrackerRepositoryError> {
        Ok(self.client(tracker)?.update(token, record).await?)
    }

    async fn fetch_tracking_status(
        &self,
        token: &str,
        tracker: &str,
        record: TrackRecord,
    ) -> Result<Option<TrackRecord>, TrackerRepositoryError> {
        Ok(self.client(tracker)?.fetch_status(token, record).await?)
    }

    async fn get_tracked_anime(
        &self,
        anime_id: i64,
    ) -> Result<Vec<TrackedAnime>, TrackerRepositoryError> {
        let rows = sqlx::query(
            r#"SELECT
                anime_id,
                tracker,
                media_id,
                title,
                score,
                last_episode_seen,
                total_episodes,
                status,
                tracking_url
            FROM tracker_anime
            WHERE anime_id = ?
            ORDER BY tracker"#,
        )
        .bind(anime_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(tracked_anime)
        .collect();

        Ok(rows)
    }

    async fn upsert_tracked_anime(
        &self,
        anime_id: i64,
        tracker: &str,
        record: &TrackRecord,
    ) -> Result<(), TrackerRepositoryError> {
        sqlx::query(
            r#"INSERT INTO tracker_anime(
                anime_id,
                tracker,
                media_id,
                title,
                score,
                last_episode_seen,
                total_episodes,
                status,
                tracking_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(anime_id, tracker) DO UPDATE SET
            media_id = excluded.media_id,
            title = excluded.title,
            score = excluded.score,
            last_episode_seen = excluded.last_episode_seen,
            total_episodes = excluded.total_episodes,
            status = excluded.status,
            tracking_url = excluded.tracking_url"#,
        )
        .bind(anime_id)
        .bind(tracker)
        .bind(record.media_id)
        .bind(&record.title)
        .bind(record.score)
        .bind(record.last_episode_seen)
        .bind(record.total_episodes)
        .bind(record.status.as_str())
        .bind(&record.tracking_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_tracked_anime(
        &self,
        anime_id: i64,
        tracker: &str,
    ) -> Result<u64, TrackerRepositoryError> {
        Ok(
            sqlx::query("DELETE FROM tracker_anime WHERE anime_id = ? AND tracker = ?")
                .bind(anime_id)
                .bind(tracker)
                .execute(&self.pool)
                .await?
                .rows_affected(),
        )
    }
}
