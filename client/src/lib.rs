//! Typed client for the marketplace REST API, plus the search page's local filtering.

use application::{AuthResponse, ContactRequest, MessageResponse, StatsResponse};
use domain::{Credentials, Listing, ListingPatch, NewListing, UserSummary};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

pub mod filters;

pub use filters::{
    CountThreshold, FilterParseError, ListingFilters, PriceBucket, apply_local_filters,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// HTTP status for errors the server answered with.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body_preview(body));
    ClientError::Api { status, message }
}

/// Talks to a running marketplace server.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: Client,
    base_url: Url,
}

impl MarketplaceClient {
    pub fn new(base_url: Url) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, ClientError> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `{base_url}/{segments..}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%method, path = url.path(), "API request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let err = map_status_error(status, &bytes);
            warn!("API request failed: {}", err);
            return Err(err);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        self.request::<(), T>(Method::GET, segments, None).await
    }

    // --- Listings ---

    /// Whole catalog, newest first.
    #[instrument(skip(self))]
    pub async fn fetch_listings(&self) -> Result<Vec<Listing>, ClientError> {
        self.get(&["api", "listings"]).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_listing(&self, id: &str) -> Result<Listing, ClientError> {
        self.get(&["api", "listings", id]).await
    }

    /// Server-side text search. A blank query is rejected by the server with 400.
    #[instrument(skip(self))]
    pub async fn remote_search(&self, text: &str) -> Result<Vec<Listing>, ClientError> {
        self.get(&["api", "listings", "search", text]).await
    }

    #[instrument(skip(self, listing), fields(title = %listing.title))]
    pub async fn create_listing(&self, listing: &NewListing) -> Result<Listing, ClientError> {
        self.request(Method::POST, &["api", "listings"], Some(listing))
            .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_listing(
        &self,
        id: &str,
        patch: &ListingPatch,
    ) -> Result<Listing, ClientError> {
        self.request(Method::PUT, &["api", "listings", id], Some(patch))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_listing(&self, id: &str) -> Result<MessageResponse, ClientError> {
        self.request::<(), _>(Method::DELETE, &["api", "listings", id], None)
            .await
    }

    /// Runs the search page: a blank query lists everything, anything else
    /// is trimmed and goes through `remote_search`. The filters are then
    /// applied locally.
    #[instrument(skip(self, filters))]
    pub async fn browse(
        &self,
        query: &str,
        filters: &ListingFilters,
    ) -> Result<Vec<Listing>, ClientError> {
        let query = query.trim();
        let listings = if query.is_empty() {
            self.fetch_listings().await?
        } else {
            self.remote_search(query).await?
        };
        let refined = apply_local_filters(&listings, filters);
        debug!(
            fetched = listings.len(),
            kept = refined.len(),
            "Applied local filters"
        );
        Ok(refined)
    }

    // --- Accounts ---

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> Result<UserSummary, ClientError> {
        let response: AuthResponse = self
            .request(Method::POST, &["api", "auth", "login"], Some(credentials))
            .await?;
        Ok(response.user)
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn signup(&self, credentials: &Credentials) -> Result<UserSummary, ClientError> {
        let response: AuthResponse = self
            .request(Method::POST, &["api", "auth", "signup"], Some(credentials))
            .await?;
        Ok(response.user)
    }

    // --- Misc ---

    #[instrument(skip(self, request))]
    pub async fn submit_contact(
        &self,
        request: &ContactRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.request(Method::POST, &["api", "contact"], Some(request))
            .await
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<StatsResponse, ClientError> {
        self.get(&["api", "stats"]).await
    }
}
