// client.rs — HTTP client for the AnkiConnect JSON-RPC API.
// Every call is a POST of {action, version: 6, params} to the local
// endpoint; responses arrive in a {result, error} envelope.
// No batching, no retries — simple and reliable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::stats::DeckStats;

/// AnkiConnect protocol version pinned by this client.
const API_VERSION: u32 = 6;

/// Failures surfaced by the RPC client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, or any other transport-level failure.
    /// Usually means Anki (or the AnkiConnect add-on) is not running.
    #[error("request to AnkiConnect failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AnkiConnect returned HTTP {0}")]
    BadStatus(StatusCode),

    /// The envelope carried a non-null error string.
    #[error("AnkiConnect error: {0}")]
    Api(String),

    #[error("AnkiConnect response did not include a result")]
    MissingResult,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

/// The three AnkiConnect actions the stats pipeline consumes. A trait seam
/// so the aggregation and refresh layers can run against a mock backend.
#[async_trait]
pub trait AnkiConnect: Send + Sync {
    /// `deckNames` — every deck name in the collection.
    async fn deck_names(&self) -> Result<Vec<String>, ClientError>;

    /// `getDeckStats` — per-deck counters, keyed by opaque deck id.
    async fn deck_stats(&self, decks: &[String]) -> Result<HashMap<String, DeckStats>, ClientError>;

    /// `getCollectionStatsHTML` — today's stats report as HTML.
    async fn collection_stats_html(&self) -> Result<String, ClientError>;
}

/// HTTP client bound to one AnkiConnect endpoint.
#[derive(Debug, Clone)]
pub struct AnkiClient {
    endpoint: String,
    http: Client,
}

impl AnkiClient {
    /// Build a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            http,
        })
    }

    /// Issue one RPC call and decode its result.
    async fn request<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let body = RpcRequest {
            action,
            version: API_VERSION,
            params,
        };

        debug!(action, endpoint = %self.endpoint, "Sending AnkiConnect request");

        let response = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::BadStatus(status));
        }

        let envelope: RpcResponse<T> = response.json().await?;

        if let Some(message) = envelope.error {
            return Err(ClientError::Api(message));
        }

        envelope.result.ok_or(ClientError::MissingResult)
    }
}

#[async_trait]
impl AnkiConnect for AnkiClient {
    async fn deck_names(&self) -> Result<Vec<String>, ClientError> {
        self.request("deckNames", None).await
    }

    async fn deck_stats(&self, decks: &[String]) -> Result<HashMap<String, DeckStats>, ClientError> {
        self.request("getDeckStats", Some(json!({ "decks": decks })))
            .await
    }

    async fn collection_stats_html(&self) -> Result<String, ClientError> {
        self.request("getCollectionStatsHTML", None).await
    }
}
