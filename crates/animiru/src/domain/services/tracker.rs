use std::future::Future;

use animiru_tracker::{SearchResult, TrackRecord, TrackStatus, Url};
use thiserror::Error;

use crate::domain::{
    entities::tracker::{Token, TrackedAnime, TrackingUpdate},
    repositories::tracker::{TrackerRepository, TrackerRepositoryError},
};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("repository error: {0}")]
    RepositoryError(#[from] TrackerRepositoryError),
    #[error("anime {0} is not tracked on {1}")]
    NotTracked(i64, String),
}

pub struct TrackerService<R>
where
    R: TrackerRepository,
{
    repo: R,
}

impl<R> TrackerService<R>
where
    R: TrackerRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn check_login(&self, tracker: &str) -> Result<(), TrackerError> {
        self.repo.get_tracker_token(tracker).await?;

        Ok(())
    }

    pub async fn logout(&self, tracker: &str) -> Result<(), TrackerError> {
        self.repo.delete_tracker_credential(tracker).await?;

        Ok(())
    }

    pub fn login_start(&self, tracker: &str) -> Result<Url, TrackerError> {
        Ok(self.repo.get_authorize_url(tracker)?)
    }

    pub async fn login_end(&self, tracker: &str, code: String) -> Result<(), TrackerError> {
        let token = self.repo.exchange_code(tracker, code).await?;

        self.repo.insert_tracker_credential(tracker, &token).await?;
        info!("logged in to {tracker}");

        Ok(())
    }

    async fn renew_token(&self, tracker: &str, token: &Token) -> Result<Token, TrackerError> {
        let token = self.repo.refresh_token(tracker, token).await?;

        self.repo.insert_tracker_credential(tracker, &token).await?;
        debug!("refreshed {tracker} token");

        Ok(token)
    }

    async fn valid_token(&self, tracker: &str) -> Result<Token, TrackerError> {
        let token = self.repo.get_tracker_token(tracker).await?;
        if token.is_expired() {
            return self.renew_token(tracker, &token).await;
        }

        Ok(token)
    }

    /// Runs `f` with the stored access token. An unauthorized result refreshes
    /// the token and runs `f` once more; nothing else is retried.
    async fn with_token<T, F, Fut>(&self, tracker: &str, f: F) -> Result<T, TrackerError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, TrackerRepositoryError>>,
    {
        let token = self.valid_token(tracker).await?;

        let res = match f(token.access_token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                let token = self.renew_token(tracker, &token).await?;
                f(token.access_token).await
            }
            res => res,
        };

        res.map_err(|e| {
            error!("{tracker} request failed: {e}");
            e.into()
        })
    }

    pub async fn search_anime(
        &self,
        tracker: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, TrackerError> {
        self.with_token(tracker, |token| async move {
            self.repo.search_anime(&token, tracker, query).await
        })
        .await
    }

    pub async fn get_tracked_anime(&self, anime_id: i64) -> Result<Vec<TrackedAnime>, TrackerError> {
        Ok(self.repo.get_tracked_anime(anime_id).await?)
    }

    async fn get_tracked_record(
        &self,
        anime_id: i64,
        tracker: &str,
    ) -> Result<TrackRecord, TrackerError> {
        self.repo
            .get_tracked_anime(anime_id)
            .await?
            .into_iter()
            .find(|tracked| tracked.tracker == tracker)
            .map(|tracked| tracked.record)
            .ok_or_else(|| TrackerError::NotTracked(anime_id, tracker.to_string()))
    }

    /// Links a local anime to a remote entry and pushes the initial status.
    pub async fn track_anime(
        &self,
        anime_id: i64,
        tracker: &str,
        media_id: i64,
        status: TrackStatus,
    ) -> Result<TrackRecord, TrackerError> {
        let details = self
            .with_token(tracker, |token| async move {
                self.repo.fetch_anime_details(&token, tracker, media_id).await
            })
            .await?;

        let record = details.into_record(status);
        let record = self
            .with_token(tracker, |token| {
                let record = record.clone();
                async move { self.repo.add_tracking(&token, tracker, record).await }
            })
            .await?;

        self.repo
            .upsert_tracked_anime(anime_id, tracker, &record)
            .await?;

        Ok(record)
    }

    /// The local record is saved only when every remote write succeeded.
    pub async fn update_tracking(
        &self,
        anime_id: i64,
        tracker: &str,
        update: TrackingUpdate,
    ) -> Result<TrackRecord, TrackerError> {
        let current = self.get_tracked_record(anime_id, tracker).await?;
        let record = update.apply(&current);

        let record = self
            .with_token(tracker, |token| {
                let record = record.clone();
                async move { self.repo.update_tracking(&token, tracker, record).await }
            })
            .await?;

        self.repo
            .upsert_tracked_anime(anime_id, tracker, &record)
            .await?;

        Ok(record)
    }

    /// Pulls the remote state of every link of `anime_id`. Entries the remote
    /// no longer has are unlinked locally.
    pub async fn fetch_tracking_status(
        &self,
        anime_id: i64,
    ) -> Result<Vec<TrackedAnime>, TrackerError> {
        let tracked = self.repo.get_tracked_anime(anime_id).await?;

        let mut data = vec![];
        for anime in tracked {
            let tracker = anime.tracker.as_str();
            let status = self
                .with_token(tracker, |token| {
                    let record = anime.record.clone();
                    async move {
                        self.repo
                            .fetch_tracking_status(&token, tracker, record)
                            .await
                    }
                })
                .await;

            match status {
                Ok(Some(record)) => {
                    self.repo
                        .upsert_tracked_anime(anime_id, tracker, &record)
                        .await?;
                    data.push(TrackedAnime { record, ..anime });
                }
                Ok(None) => {
                    info!(
                        "{} entry {} not found, unlinking anime {anime_id}",
                        anime.tracker, anime.record.media_id
                    );
                    self.repo.delete_tracked_anime(anime_id, tracker).await?;
                }
                Err(TrackerError::RepositoryError(TrackerRepositoryError::NotLoggedIn)) => {
                    warn!("not logged in to {}, skipping", anime.tracker);
                    data.push(anime);
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        Ok(data)
    }

    pub async fn untrack_anime(&self, anime_id: i64, tracker: &str) -> Result<(), TrackerError> {
        self.repo.delete_tracked_anime(anime_id, tracker).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use animiru_tracker::{AuthError, Error, Tracker};
    use async_trait::async_trait;
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::infrastructure::{
        database::open_store, repositories::tracker::TrackerRepositoryImpl,
    };

    const NAME: &str = "scripted";

    /// Accepts only `valid` as access token, or nothing when `reject_all` is
    /// set; refresh hands out `valid` unless `revoked` is set.
    #[derive(Default)]
    struct State {
        refreshes: AtomicUsize,
        calls: AtomicUsize,
        revoked: AtomicBool,
        reject_all: AtomicBool,
        remote: Mutex<Option<TrackRecord>>,
        fail_progress: AtomicBool,
    }

    struct ScriptedTracker(Arc<State>);

    impl ScriptedTracker {
        fn check(&self, token: &str) -> Result<(), Error> {
            self.0.calls.fetch_add(1, Ordering::SeqCst);
            if token == "valid" && !self.0.reject_all.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Error::Unauthorized)
            }
        }
    }

    fn token(access_token: &str) -> Token {
        Token {
            token_type: "bearer".to_string(),
            expires_in: 3600,
            access_token: access_token.to_string(),
            refresh_token: "refresh".to_string(),
            created_at: Utc::now().timestamp(),
        }
    }

    #[async_trait]
    impl Tracker for ScriptedTracker {
        fn name(&self) -> &'static str {
            NAME
        }

        fn authorize_url(&self) -> Url {
            Url::parse("https://tracker.test/oauth/authorize?client_id=id").unwrap()
        }

        async fn exchange_code(&self, code: String) -> Result<Token, AuthError> {
            if code == "good" {
                Ok(token("valid"))
            } else {
                Err(AuthError::InvalidCode(code))
            }
        }

        async fn refresh_token(&self, _token: &Token) -> Result<Token, AuthError> {
            self.0.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.0.revoked.load(Ordering::SeqCst) {
                Err(AuthError::InvalidRefreshToken("invalid_grant".to_string()))
            } else {
                Ok(token("valid"))
            }
        }

        async fn search(&self, token: &str, query: &str) -> Result<Vec<SearchResult>, Error> {
            self.check(token)?;
            Ok(vec![SearchResult {
                media_id: 1,
                title: query.to_string(),
                ..Default::default()
            }])
        }

        async fn get_subject(&self, token: &str, media_id: i64) -> Result<SearchResult, Error> {
            self.check(token)?;
            Ok(SearchResult {
                media_id,
                title: "Serial Experiments Lain".to_string(),
                tracking_url: format!("https://tracker.test/subject/{media_id}"),
                total_episodes: 13,
                ..Default::default()
            })
        }

        async fn add(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error> {
            self.check(token)?;
            *self.0.remote.lock().unwrap() = Some(record.clone());
            Ok(record)
        }

        async fn update(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error> {
            self.check(token)?;
            let mut remote = self.0.remote.lock().unwrap();
            let previous = remote.clone().unwrap_or_default();
            if self.0.fail_progress.load(Ordering::SeqCst) {
                *remote = Some(TrackRecord {
                    last_episode_seen: previous.last_episode_seen,
                    ..record
                });
                return Err(Error::PartialUpdate(Box::new(Error::Network(
                    "connection reset".to_string(),
                ))));
            }
            *remote = Some(record.clone());
            Ok(record)
        }

        async fn fetch_status(
            &self,
            token: &str,
            record: TrackRecord,
        ) -> Result<Option<TrackRecord>, Error> {
            self.check(token)?;
            Ok(self.0.remote.lock().unwrap().clone().map(|remote| TrackRecord {
                media_id: record.media_id,
                ..remote
            }))
        }
    }

    async fn service(dir: &TempDir) -> (TrackerService<TrackerRepositoryImpl>, Arc<State>) {
        let path = dir.path().join("animiru.db");
        let pool = open_store(&path.display().to_string(), true)
            .await
            .unwrap();
        let state = Arc::new(State::default());
        let repo = TrackerRepositoryImpl::new(pool).register(ScriptedTracker(state.clone()));

        (TrackerService::new(repo), state)
    }

    #[tokio::test]
    async fn test_login() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir).await;

        assert!(svc.check_login(NAME).await.is_err());
        assert!(svc.login_end(NAME, "bad".to_string()).await.is_err());
        assert!(svc.check_login(NAME).await.is_err());

        svc.login_end(NAME, "good".to_string()).await.unwrap();
        svc.check_login(NAME).await.unwrap();

        svc.logout(NAME).await.unwrap();
        assert!(svc.check_login(NAME).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_tracker() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir).await;

        assert!(matches!(
            svc.login_start("kitsu"),
            Err(TrackerError::RepositoryError(TrackerRepositoryError::NoTracker))
        ));
        assert!(svc.login_start(NAME).is_ok());
    }

    #[tokio::test]
    async fn test_search_refreshes_once() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;

        svc.repo
            .insert_tracker_credential(NAME, &token("stale"))
            .await
            .unwrap();

        let results = svc.search_anime(NAME, "lain").await.unwrap();
        assert_eq!("lain", results[0].title);
        assert_eq!(1, state.refreshes.load(Ordering::SeqCst));

        let stored = svc.repo.get_tracker_token(NAME).await.unwrap();
        assert_eq!("valid", stored.access_token);
    }

    #[tokio::test]
    async fn test_search_revoked_refresh_token() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;

        svc.repo
            .insert_tracker_credential(NAME, &token("stale"))
            .await
            .unwrap();
        state.revoked.store(true, Ordering::SeqCst);

        let e = svc.search_anime(NAME, "lain").await.unwrap_err();
        assert!(matches!(
            e,
            TrackerError::RepositoryError(TrackerRepositoryError::TrackerError(Error::Auth(
                AuthError::InvalidRefreshToken(_)
            )))
        ));
        assert_eq!(1, state.refreshes.load(Ordering::SeqCst));

        let stored = svc.repo.get_tracker_token(NAME).await.unwrap();
        assert_eq!("stale", stored.access_token);
    }

    #[tokio::test]
    async fn test_search_retries_only_once() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;

        svc.repo
            .insert_tracker_credential(NAME, &token("stale"))
            .await
            .unwrap();
        state.reject_all.store(true, Ordering::SeqCst);

        let e = svc.search_anime(NAME, "lain").await.unwrap_err();
        assert!(matches!(
            e,
            TrackerError::RepositoryError(TrackerRepositoryError::TrackerError(
                Error::Unauthorized
            ))
        ));
        assert_eq!(1, state.refreshes.load(Ordering::SeqCst));
        assert_eq!(2, state.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_before_request() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;

        let mut expired = token("stale");
        expired.created_at -= 7200;
        svc.repo
            .insert_tracker_credential(NAME, &expired)
            .await
            .unwrap();

        svc.search_anime(NAME, "lain").await.unwrap();
        assert_eq!(1, state.refreshes.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_track_update_and_fetch() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir).await;
        svc.login_end(NAME, "good".to_string()).await.unwrap();

        let record = svc
            .track_anime(42, NAME, 9, TrackStatus::PlanToWatch)
            .await
            .unwrap();
        assert_eq!(9, record.media_id);
        assert_eq!(13, record.total_episodes);

        let record = svc
            .update_tracking(
                42,
                NAME,
                TrackingUpdate {
                    status: Some(TrackStatus::Watching),
                    last_episode_seen: Some(3.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(TrackStatus::Watching, record.status);

        let tracked = svc.fetch_tracking_status(42).await.unwrap();
        assert_eq!(1, tracked.len());
        assert_eq!(3.0, tracked[0].record.last_episode_seen);
        assert_eq!("Serial Experiments Lain", tracked[0].record.title);
    }

    #[tokio::test]
    async fn test_update_partial_failure_keeps_local_record() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;
        svc.login_end(NAME, "good".to_string()).await.unwrap();
        svc.track_anime(42, NAME, 9, TrackStatus::PlanToWatch)
            .await
            .unwrap();

        state.fail_progress.store(true, Ordering::SeqCst);
        let res = svc
            .update_tracking(
                42,
                NAME,
                TrackingUpdate {
                    status: Some(TrackStatus::Watching),
                    last_episode_seen: Some(3.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            res,
            Err(TrackerError::RepositoryError(TrackerRepositoryError::TrackerError(
                Error::PartialUpdate(_)
            )))
        ));

        let remote = state.remote.lock().unwrap().clone().unwrap();
        assert_eq!(TrackStatus::Watching, remote.status);
        assert_eq!(0.0, remote.last_episode_seen);

        let local = svc.get_tracked_anime(42).await.unwrap();
        assert_eq!(TrackStatus::PlanToWatch, local[0].record.status);
    }

    #[tokio::test]
    async fn test_fetch_unlinks_missing_entry() {
        let dir = TempDir::new().unwrap();
        let (svc, state) = service(&dir).await;
        svc.login_end(NAME, "good".to_string()).await.unwrap();
        svc.track_anime(42, NAME, 9, TrackStatus::Watching)
            .await
            .unwrap();

        *state.remote.lock().unwrap() = None;
        let tracked = svc.fetch_tracking_status(42).await.unwrap();
        assert!(tracked.is_empty());
        assert!(svc.get_tracked_anime(42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_untracked_anime() {
        let dir = TempDir::new().unwrap();
        let (svc, _) = service(&dir).await;
        svc.login_end(NAME, "good".to_string()).await.unwrap();

        let res = svc
            .update_tracking(7, NAME, TrackingUpdate::default())
            .await;
        assert!(matches!(res, Err(TrackerError::NotTracked(7, _))));

        svc.untrack_anime(7, NAME).await.unwrap();
    }
}
