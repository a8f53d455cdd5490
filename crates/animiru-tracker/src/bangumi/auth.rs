use chrono::Utc;
use oauth2::{
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
    url::Url,
    AuthUrl, AuthorizationCode, ClientId, RedirectUrl, RefreshToken, RequestTokenError,
};
use serde::Deserialize;

use crate::{
    http::{oauth_http_client, HttpClient},
    AuthError, Error, Token,
};

pub fn authorize_url(
    authorize_url: &AuthUrl,
    client_id: &ClientId,
    redirect_url: &RedirectUrl,
) -> Url {
    let mut url = authorize_url.url().clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id.as_str())
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_url.as_str());
    url
}

pub async fn exchange_code(
    oauth_client: &BasicClient,
    http: &dyn HttpClient,
    code: String,
) -> Result<Token, AuthError> {
    let response = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(|request| oauth_http_client(http, request))
        .await
        .map_err(|e| auth_error(e, AuthError::InvalidCode))?;

    into_token(response, None)
}

pub async fn refresh_token(
    oauth_client: &BasicClient,
    http: &dyn HttpClient,
    redirect_url: &RedirectUrl,
    token: &Token,
) -> Result<Token, AuthError> {
    let refresh_token = RefreshToken::new(token.refresh_token.clone());
    let response = oauth_client
        .exchange_refresh_token(&refresh_token)
        .add_extra_param("redirect_uri", redirect_url.to_string())
        .request_async(|request| oauth_http_client(http, request))
        .await
        .map_err(|e| auth_error(e, AuthError::InvalidRefreshToken))?;

    into_token(response, Some(&token.refresh_token))
}

fn auth_error(
    e: RequestTokenError<Error, BasicErrorResponse>,
    rejected: fn(String) -> AuthError,
) -> AuthError {
    match e {
        RequestTokenError::ServerResponse(response) => rejected(format!("{response}")),
        RequestTokenError::Request(Error::Network(e)) => AuthError::NetworkFailure(e),
        RequestTokenError::Request(e) => AuthError::NetworkFailure(format!("{e}")),
        RequestTokenError::Parse(e, _) => AuthError::Malformed(format!("{e}")),
        RequestTokenError::Other(e) => AuthError::Malformed(e),
    }
}

#[derive(Debug, Deserialize)]
struct TokenFields {
    token_type: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

fn into_token(
    response: BasicTokenResponse,
    previous_refresh_token: Option<&str>,
) -> Result<Token, AuthError> {
    let value =
        serde_json::to_value(&response).map_err(|e| AuthError::Malformed(format!("{e}")))?;
    let fields: TokenFields =
        serde_json::from_value(value).map_err(|e| AuthError::Malformed(format!("{e}")))?;

    let refresh_token = fields
        .refresh_token
        .or_else(|| previous_refresh_token.map(|t| t.to_string()))
        .ok_or_else(|| AuthError::Malformed("no refresh token".to_string()))?;

    Ok(Token {
        token_type: fields.token_type,
        expires_in: fields.expires_in.unwrap_or(0),
        access_token: fields.access_token,
        refresh_token,
        created_at: Utc::now().timestamp(),
    })
}
