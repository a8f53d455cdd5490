//! Bangumi (bgm.tv) tracker.
//!
//! Status, score and episode progress live behind two endpoints, so
//! [`Tracker::update`] is two requests. When the second one fails the remote
//! status is already saved and the error is [`Error::PartialUpdate`]; use
//! [`Bangumi::update_progress`] to retry just the progress write.

mod auth;
mod decode;
mod request;

pub use decode::CollectionStatus;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, url::Url, AuthType, AuthUrl, ClientId, ClientSecret, RedirectUrl,
    TokenUrl,
};

use crate::{
    http::{HttpClient, HttpRequest, HttpResponse},
    AuthError, Error, SearchResult, Token, TrackRecord, Tracker,
};

pub const NAME: &str = "bangumi";

pub const API_URL: &str = "https://api.bgm.tv";
pub const AUTHORIZE_URL: &str = "https://bgm.tv/oauth/authorize";
pub const TOKEN_URL: &str = "https://bgm.tv/oauth/access_token";
pub const REDIRECT_URL: &str = "animiru://bangumi-auth";

pub struct Bangumi {
    oauth_client: BasicClient,
    client_id: ClientId,
    authorize_url: AuthUrl,
    redirect_url: RedirectUrl,
    api_url: Url,
    http: Arc<dyn HttpClient>,
}

impl Bangumi {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: &str,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self, Error> {
        let client_id = ClientId::new(client_id);
        let client_secret = ClientSecret::new(client_secret);
        let authorize_url =
            AuthUrl::new(AUTHORIZE_URL.to_string()).map_err(|e| anyhow!("{e}"))?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string()).map_err(|e| anyhow!("{e}"))?;
        let redirect_url =
            RedirectUrl::new(redirect_url.to_string()).map_err(|e| anyhow!("{e}"))?;

        let oauth_client = BasicClient::new(
            client_id.clone(),
            Some(client_secret),
            authorize_url.clone(),
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url.clone());

        Ok(Self {
            oauth_client,
            client_id,
            authorize_url,
            redirect_url,
            api_url: Url::parse(API_URL).map_err(|e| anyhow!("{e}"))?,
            http,
        })
    }

    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, Error> {
        self.api_url = Url::parse(api_url).map_err(|e| anyhow!("{e}"))?;
        Ok(self)
    }

    async fn send(&self, token: &str, request: HttpRequest) -> Result<HttpResponse, Error> {
        debug!("{} {}", request.method, request.url);

        let res = self.http.execute(request.bearer_auth(token)).await?;
        match res.status {
            401 => Err(Error::Unauthorized),
            _ if res.is_success() => Ok(res),
            code => Err(Error::Remote {
                code: code as i64,
                message: res.body,
            }),
        }
    }

    async fn update_status(&self, token: &str, record: &TrackRecord) -> Result<(), Error> {
        let res = self
            .send(token, request::update_collection(&self.api_url, record)?)
            .await?;
        decode::decode_ack(&res.body)?;

        Ok(())
    }

    /// Writes only the watched episode count.
    pub async fn update_progress(&self, token: &str, record: &TrackRecord) -> Result<(), Error> {
        let res = self
            .send(token, request::update_watched_episodes(&self.api_url, record)?)
            .await?;
        decode::decode_ack(&res.body)?;

        Ok(())
    }
}

#[async_trait]
impl Tracker for Bangumi {
    fn name(&self) -> &'static str {
        NAME
    }

    fn authorize_url(&self) -> Url {
        auth::authorize_url(&self.authorize_url, &self.client_id, &self.redirect_url)
    }

    async fn exchange_code(&self, code: String) -> Result<Token, AuthError> {
        auth::exchange_code(&self.oauth_client, self.http.as_ref(), code).await
    }

    async fn refresh_token(&self, token: &Token) -> Result<Token, AuthError> {
        auth::refresh_token(
            &self.oauth_client,
            self.http.as_ref(),
            &self.redirect_url,
            token,
        )
        .await
    }

    async fn search(&self, token: &str, query: &str) -> Result<Vec<SearchResult>, Error> {
        let res = self
            .send(token, request::search_subject(&self.api_url, query)?)
            .await?;

        let results = decode::decode_search_list(&res.body)?;
        debug!("search {query:?}: {} results", results.len());

        Ok(results)
    }

    async fn get_subject(&self, token: &str, media_id: i64) -> Result<SearchResult, Error> {
        let res = self
            .send(token, request::get_subject(&self.api_url, media_id)?)
            .await?;

        Ok(decode::decode_subject(&res.body)?)
    }

    async fn add(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error> {
        self.update_status(token, &record).await?;

        Ok(record)
    }

    async fn update(&self, token: &str, record: TrackRecord) -> Result<TrackRecord, Error> {
        self.update_status(token, &record).await?;

        if let Err(e) = self.update_progress(token, &record).await {
            warn!(
                "bangumi subject {} status saved but progress failed: {e}",
                record.media_id
            );
            return Err(Error::PartialUpdate(Box::new(e)));
        }

        Ok(record)
    }

    async fn fetch_status(
        &self,
        token: &str,
        record: TrackRecord,
    ) -> Result<Option<TrackRecord>, Error> {
        let res = self
            .send(token, request::get_collection(&self.api_url, record.media_id)?)
            .await?;

        Ok(decode::decode_status(&res.body, &record)?)
    }
}
