//! Xtream Codes Player API Client
//!
//! Only the catalogue endpoints needed to generate a playlist are covered.

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

use super::types::*;

/// Xtream API Error types
#[derive(Debug, Error)]
pub enum XtreamError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Player API client bound to one upstream account
pub struct XtreamClient {
    http: Client,
    base_url: String,
}

impl XtreamClient {
    pub fn new(http: Client, creds: &XtreamCredentials) -> Self {
        Self {
            http,
            base_url: creds.api_url(),
        }
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}&action={}", self.base_url, action)
    }

    async fn get<T: DeserializeOwned + Default>(&self, action: &str) -> Result<T, XtreamError> {
        debug!("Xtream API request: {}", action);

        let response = self.http.get(self.action_url(action)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(XtreamError::Http(status.as_u16()));
        }

        let text = response.text().await?;

        // Some panels answer an empty body or `null` when there is nothing to list
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(T::default());
        }

        serde_json::from_str(trimmed).map_err(|e| {
            error!("Failed to parse Xtream response for action '{}': {}", action, e);
            XtreamError::Parse(e)
        })
    }

    pub async fn get_live_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.get("get_live_categories").await
    }

    pub async fn get_live_streams(&self) -> Result<Vec<XtreamLiveStream>, XtreamError> {
        self.get("get_live_streams").await
    }

    pub async fn get_vod_categories(&self) -> Result<Vec<XtreamCategory>, XtreamError> {
        self.get("get_vod_categories").await
    }

    pub async fn get_vod_streams(&self) -> Result<Vec<XtreamVodStream>, XtreamError> {
        self.get("get_vod_streams").await
    }
}
