use std::fmt;

use async_trait::async_trait;
use oauth2::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    url::{form_urlencoded, Url},
};
use reqwest::header::CACHE_CONTROL;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Never answer from a cache.
    pub force_network: bool,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: vec![],
            body: Body::Empty,
            force_network: false,
        }
    }

    pub fn post_form(url: Url, params: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: vec![],
            body: Body::Form(params),
            force_network: false,
        }
    }

    pub fn force_network(mut self) -> Self {
        self.force_network = true;
        self
    }

    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {token}")));
        self
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            Body::Form(params) => params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Body::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one request and awaits the whole response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(user_agent: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Network(format!("{e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let mut req = match request.method {
            Method::Get => self.client.get(request.url.as_str()),
            Method::Post => self.client.post(request.url.as_str()),
        };
        for (name, value) in request.headers.iter() {
            req = req.header(name.as_str(), value.as_str());
        }
        if request.force_network {
            req = req.header(CACHE_CONTROL, "no-cache");
        }
        if let Body::Form(params) = &request.body {
            req = req.form(params);
        }

        let res = req
            .send()
            .await
            .map_err(|e| Error::Network(format!("{e}")))?;

        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = res
            .text()
            .await
            .map_err(|e| Error::Network(format!("{e}")))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Runs an `oauth2` token request through an [`HttpClient`].
pub(crate) async fn oauth_http_client(
    client: &dyn HttpClient,
    request: oauth2::HttpRequest,
) -> Result<oauth2::HttpResponse, Error> {
    let method = if request.method == oauth2::http::Method::GET {
        Method::Get
    } else {
        Method::Post
    };
    let headers = request
        .headers
        .iter()
        .filter(|(name, _)| **name == ACCEPT)
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = if request.body.is_empty() {
        Body::Empty
    } else {
        Body::Form(
            form_urlencoded::parse(&request.body)
                .into_owned()
                .collect(),
        )
    };

    let response = client
        .execute(HttpRequest {
            method,
            url: request.url,
            headers,
            body,
            force_network: true,
        })
        .await?;

    let mut headers = HeaderMap::new();
    if let Some(content_type) = response
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(CONTENT_TYPE, content_type);
    }

    Ok(oauth2::HttpResponse {
        status_code: StatusCode::from_u16(response.status)
            .map_err(|e| Error::Network(format!("{e}")))?,
        headers,
        body: response.body.into_bytes(),
    })
}
