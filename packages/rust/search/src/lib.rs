//! Serper web-search client.
//!
//! Used only by the research stage, and only when the model asks for it.
//! Results are returned as [`SearchHit`]s, truncated to the configured
//! result count.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use scribe_shared::{Result, ScribeError, SearchSettings};

/// Path of the search endpoint relative to the base URL.
const SEARCH_PATH: &str = "search";

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("Scribe/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 500;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

/// Client for one search provider account.
#[derive(Debug, Clone)]
pub struct SerperClient {
    http: Client,
    endpoint: Url,
    settings: SearchSettings,
}

impl SerperClient {
    /// Build a client from resolved settings.
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let endpoint = settings
            .base_url
            .join(SEARCH_PATH)
            .map_err(|e| ScribeError::config(format!("invalid search endpoint: {e}")))?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScribeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            settings: settings.clone(),
        })
    }

    /// Run one query.
    #[instrument(skip(self), fields(n = self.settings.n_results))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!("searching the web");

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("X-API-KEY", &self.settings.api_key)
            .json(&SearchRequest {
                q: query,
                num: self.settings.n_results,
            })
            .send()
            .await
            .map_err(|e| ScribeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(ScribeError::Search(format!("HTTP {status}: {body}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::parse(format!("invalid search response: {e}")))?;

        let mut hits = parsed.organic;
        hits.truncate(self.settings.n_results as usize);

        info!(hits = hits.len(), "search completed");
        Ok(hits)
    }
}

/// Render hits as plain text blocks.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    hits.iter()
        .map(|h| format!("Title: {}\nLink: {}\nSnippet: {}\n---", h.title, h.link, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}
