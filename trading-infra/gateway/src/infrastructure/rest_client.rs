use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

use super::signing::{SignError, sign_query};
use crate::domain::{SessionKeyError, SessionKeyProvider};

/// Default user-data stream endpoint (USD-M futures)
pub const DEFAULT_LISTEN_KEY_PATH: &str = "/fapi/v1/listenKey";

/// Per-request deadline; a hung endpoint surfaces as a network error
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {code} - {msg}")]
    Api { code: i64, msg: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),
}

/// Convert infrastructure RestError to domain SessionKeyError
impl From<RestError> for SessionKeyError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) => SessionKeyError::Network(e.to_string()),
            RestError::Api { code, msg } => SessionKeyError::Api { code, message: msg },
            RestError::Parse(msg) => SessionKeyError::Parse(msg),
            RestError::Sign(e) => SessionKeyError::Parse(e.to_string()),
        }
    }
}

/// REST client for the exchange account endpoints
/// Infrastructure component - handles HTTP communication
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    listen_key_path: String,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, RestError> {
        Self::with_timeout(base_url, api_key, api_secret, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(RestClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            listen_key_path: DEFAULT_LISTEN_KEY_PATH.to_string(),
        })
    }

    /// Override the user-data stream path (spot uses `/api/v3/userDataStream`)
    pub fn with_listen_key_path(mut self, path: impl Into<String>) -> Self {
        self.listen_key_path = path.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create (or fetch the currently valid) listen key
    pub async fn create_listen_key(&self) -> Result<String, RestError> {
        #[derive(Deserialize)]
        struct ListenKeyResponse {
            #[serde(rename = "listenKey")]
            listen_key: String,
        }

        let resp: ListenKeyResponse = self.send(Method::POST, &self.listen_key_path, "").await?;
        Ok(resp.listen_key)
    }

    /// Extend the validity of a listen key
    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), RestError> {
        let query = format!("listenKey={}", listen_key);
        let _: serde_json::Value = self.send(Method::PUT, &self.listen_key_path, &query).await?;
        Ok(())
    }

    /// Signed query string for `query` + `body` at the current time
    pub fn signed_query(&self, query: &str, body: &str) -> Result<String, RestError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        Ok(sign_query(&self.api_secret, query, body, now_ms)?)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &str,
    ) -> Result<T, RestError> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        let resp = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        parse_response(status, &text)
    }
}

#[derive(Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

fn parse_response<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, RestError> {
    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<ApiError>(text) {
            return Err(RestError::Api {
                code: err.code,
                msg: err.msg,
            });
        }
        return Err(RestError::Parse(format!("HTTP {}: {}", status, text)));
    }

    serde_json::from_str(text).map_err(|e| RestError::Parse(e.to_string()))
}

#[async_trait]
impl SessionKeyProvider for RestClient {
    async fn create_session_key(&self) -> Result<String, SessionKeyError> {
        let key = self.create_listen_key().await?;
        if key.is_empty() {
            return Err(SessionKeyError::EmptyKey);
        }
        Ok(key)
    }

    async fn keepalive_session_key(&self, key: &str) -> Result<(), SessionKeyError> {
        Ok(self.keepalive_listen_key(key).await?)
    }
}
