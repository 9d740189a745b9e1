//! Remote gateway
//!
//! Reads the remote quote collection and pushes the local one back. Every
//! failure is caught here and turned into a [`FetchOutcome::Unavailable`] or
//! [`PushOutcome::Failed`]; nothing is raised to the caller.
//!
//! Note that an unreachable remote and an empty remote both reduce to an
//! empty quote list once [`FetchOutcome::into_quotes`] is applied, so the
//! reconciler cannot tell them apart.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::TransportError;
use crate::models::Quote;

/// How remote payload items map onto quotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteMapping {
    /// Generic posts: `title` becomes the text, a prefix of `body` the category
    #[default]
    Posts,
    /// Items are already `{text, category}` records
    Quotes,
}

impl FromStr for RemoteMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "posts" => Ok(RemoteMapping::Posts),
            "quotes" => Ok(RemoteMapping::Quotes),
            other => Err(format!(
                "unknown remote mapping '{}' (expected 'posts' or 'quotes')",
                other
            )),
        }
    }
}

impl fmt::Display for RemoteMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteMapping::Posts => write!(f, "posts"),
            RemoteMapping::Quotes => write!(f, "quotes"),
        }
    }
}

/// Result of reading the remote collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Remote answered with these quotes (possibly none)
    Fetched(Vec<Quote>),
    /// Remote could not be read; carries the reason for logging
    Unavailable(String),
}

impl FetchOutcome {
    /// Quotes to reconcile; empty when the remote was unavailable
    pub fn into_quotes(self) -> Vec<Quote> {
        match self {
            FetchOutcome::Fetched(quotes) => quotes,
            FetchOutcome::Unavailable(_) => Vec::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }
}

/// Result of pushing the local collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Failed(String),
}

impl PushOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushOutcome::Pushed)
    }
}

/// Source and sink of the remote quote collection
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Read the remote collection
    async fn fetch_remote(&self) -> FetchOutcome;

    /// Write the full local collection to the remote
    async fn push_local(&self, quotes: &[Quote]) -> PushOutcome;
}

/// [`RemoteGateway`] over HTTP (`GET` to fetch, `POST` to push)
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    mapping: RemoteMapping,
    category_prefix_len: usize,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a gateway for `url`
    pub fn new(
        url: impl Into<String>,
        mapping: RemoteMapping,
        category_prefix_len: usize,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quotesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url,
            mapping,
            category_prefix_len,
            timeout,
        })
    }

    /// Create a gateway from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(
            config.server_url.clone(),
            config.remote_mapping,
            config.category_prefix_len,
            config.request_timeout(),
        )
    }

    async fn try_fetch(&self) -> Result<Vec<Quote>, TransportError> {
        debug!("Fetching remote quotes from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(|e| self.payload_error(e))?;

        map_payload(payload, self.mapping, self.category_prefix_len).map_err(|details| {
            TransportError::Payload {
                url: self.url.clone(),
                details,
            }
        })
    }

    async fn try_push(&self, quotes: &[Quote]) -> Result<(), TransportError> {
        debug!("Pushing {} quotes to {}", quotes.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .json(quotes)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        // The server echoes JSON back; anything else counts as a failed push
        response
            .json::<Value>()
            .await
            .map_err(|e| self.payload_error(e))?;

        Ok(())
    }

    fn request_error(&self, source: reqwest::Error) -> TransportError {
        if source.is_timeout() {
            TransportError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            TransportError::Request {
                url: self.url.clone(),
                source,
            }
        }
    }

    fn payload_error(&self, source: reqwest::Error) -> TransportError {
        if source.is_timeout() {
            return self.request_error(source);
        }
        TransportError::Payload {
            url: self.url.clone(),
            details: source.to_string(),
        }
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_remote(&self) -> FetchOutcome {
        match self.try_fetch().await {
            Ok(quotes) => {
                info!("Fetched {} remote quotes", quotes.len());
                FetchOutcome::Fetched(quotes)
            }
            Err(e) => {
                if e.is_unreachable() {
                    warn!("Server unreachable: {}", e);
                } else {
                    warn!("Fetch failed: {}", e);
                }
                FetchOutcome::Unavailable(e.to_string())
            }
        }
    }

    async fn push_local(&self, quotes: &[Quote]) -> PushOutcome {
        match self.try_push(quotes).await {
            Ok(()) => {
                info!("Pushed {} quotes to server", quotes.len());
                PushOutcome::Pushed
            }
            Err(e) => {
                warn!("Push failed: {}", e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Map a remote payload to quotes
///
/// The payload must be an array. With [`RemoteMapping::Posts`] every item
/// needs string `title` and `body` fields; the category is the first
/// `category_prefix_len` characters of the body. One bad item rejects the
/// whole payload.
pub fn map_payload(
    payload: Value,
    mapping: RemoteMapping,
    category_prefix_len: usize,
) -> Result<Vec<Quote>, String> {
    let Value::Array(items) = payload else {
        return Err("expected a JSON array".to_string());
    };

    match mapping {
        RemoteMapping::Quotes => {
            serde_json::from_value(Value::Array(items)).map_err(|e| e.to_string())
        }
        RemoteMapping::Posts => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let title = item.get("title").and_then(Value::as_str);
                let body = item.get("body").and_then(Value::as_str);
                match (title, body) {
                    (Some(title), Some(body)) => Ok(Quote {
                        text: title.to_string(),
                        category: body.chars().take(category_prefix_len).collect(),
                    }),
                    _ => Err(format!("item {} is missing a string title or body", i)),
                }
            })
            .collect(),
    }
}
