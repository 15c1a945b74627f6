//! Firebase Realtime Database backend, spoken to over its REST API.
//!
//! Every node is addressed as `{database_url}/{path}.json`. Collections live
//! under `users/` and `listings/`, keyed by entity id.

use application::{ApplicationError, Clock, ListingRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Listing, ListingId, ListingPatch, NewListing, NewUser, User, UserId, sort_newest_first,
};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use url::Url;

const USERS: &str = "users";
const LISTINGS: &str = "listings";

/// Connection settings for the remote database.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Root of the database, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    pub database_url: Url,
    /// Sent as the `auth` query parameter when present.
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

#[derive(Error, Debug)]
enum RemoteError {
    #[error("request to Firebase failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Firebase returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected Firebase payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid Firebase URL: {0}")]
    Url(String),
}

impl From<RemoteError> for ApplicationError {
    fn from(err: RemoteError) -> Self {
        error!("Firebase operation failed: {}", err);
        ApplicationError::InfrastructureError(err.to_string())
    }
}

/// Firebase keys may not contain these characters; such ids can never be stored.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '.' | '$' | '#' | '[' | ']' | '/') || c.is_control())
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

/// A record that does not decode is treated as absent.
fn decode_record<T: DeserializeOwned>(collection: &str, key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!(collection, key, "Skipping malformed record: {}", e);
            None
        }
    }
}

/// Decodes each child of a collection node, skipping malformed records.
fn decode_children<T: DeserializeOwned>(collection: &str, children: BTreeMap<String, Value>) -> Vec<T> {
    children
        .into_iter()
        .filter_map(|(key, value)| decode_record(collection, &key, value))
        .collect()
}

/// Storage backed by a Firebase Realtime Database.
///
/// Each call is one or more HTTP round trips; nothing is cached.
#[derive(Debug, Clone)]
pub struct FirebaseStorage {
    client: Client,
    database_url: Url,
    auth_token: Option<String>,
    clock: Arc<dyn Clock>,
}

impl FirebaseStorage {
    pub fn new(config: FirebaseConfig, clock: Arc<dyn Clock>) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ApplicationError::InfrastructureError(format!("Failed to build HTTP client: {}", e))
            })?;
        if config.database_url.cannot_be_a_base() {
            return Err(ApplicationError::InfrastructureError(format!(
                "Firebase database URL '{}' is not a valid base URL",
                config.database_url
            )));
        }
        Ok(Self {
            client,
            database_url: config.database_url,
            auth_token: config.auth_token,
            clock,
        })
    }

    /// `{database_url}/{segments..}.json?auth=..`
    fn node_url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.database_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| RemoteError::Url(self.database_url.to_string()))?;
            path.pop_if_empty();
            if let Some((last, parents)) = segments.split_last() {
                path.extend(parents);
                path.push(&format!("{last}.json"));
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, RemoteError> {
        debug!(%method, path = url.path(), "Firebase request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                body: body_preview(&bytes),
            });
        }
        Ok(bytes.to_vec())
    }

    /// GET a node; JSON `null` (absent node) decodes to `None`.
    async fn get_node<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RemoteError> {
        let bytes = self.send(Method::GET, url, None).await?;
        Ok(serde_json::from_slice::<Option<T>>(&bytes)?)
    }

    /// Point read of `{collection}/{key}`, decoded leniently.
    async fn get_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, RemoteError> {
        let url = self.node_url(&[collection, key])?;
        Ok(self
            .get_node::<Value>(url)
            .await?
            .and_then(|value| decode_record(collection, key, value)))
    }

    async fn write_node<T: Serialize>(
        &self,
        method: Method,
        segments: &[&str],
        value: &T,
    ) -> Result<(), RemoteError> {
        let url = self.node_url(segments)?;
        let body = serde_json::to_value(value)?;
        self.send(method, url, Some(&body)).await?;
        Ok(())
    }

    async fn fetch_users(&self, username: Option<&str>) -> Result<Vec<User>, RemoteError> {
        let mut url = self.node_url(&[USERS])?;
        if let Some(username) = username {
            let equal_to = serde_json::to_string(username)?;
            url.query_pairs_mut()
                .append_pair("orderBy", "\"username\"")
                .append_pair("equalTo", &equal_to);
        }
        let children = self
            .get_node::<BTreeMap<String, Value>>(url)
            .await?
            .unwrap_or_default();
        Ok(decode_children(USERS, children))
    }

    async fn fetch_listings(&self) -> Result<Vec<Listing>, RemoteError> {
        let url = self.node_url(&[LISTINGS])?;
        let children = self
            .get_node::<BTreeMap<String, Value>>(url)
            .await?
            .unwrap_or_default();
        Ok(decode_children(LISTINGS, children))
    }
}

// --- User Repository Implementation ---

#[async_trait]
impl UserRepository for FirebaseStorage {
    #[instrument(skip(self))]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, ApplicationError> {
        if !is_valid_key(id.as_str()) {
            return Ok(None);
        }
        Ok(self.get_record(USERS, id.as_str()).await?)
    }

    /// Indexed query first, re-verified in process. Falls back to a full scan
    /// when the query is rejected (no `.indexOn` rule) or finds nothing.
    #[instrument(skip(self))]
    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, ApplicationError> {
        match self.fetch_users(Some(username)).await {
            Ok(users) => {
                if let Some(user) = users.into_iter().find(|u| u.username == username) {
                    return Ok(Some(user));
                }
                debug!("Indexed username query found no match, scanning all users");
            }
            Err(RemoteError::Status { status, body }) if status == StatusCode::BAD_REQUEST => {
                warn!(%body, "Indexed username query rejected, scanning all users");
            }
            Err(e) => return Err(e.into()),
        }

        let users = self.fetch_users(None).await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: NewUser) -> Result<User, ApplicationError> {
        let user = user.into_user(UserId::generate());
        self.write_node(Method::PUT, &[USERS, user.id.as_str()], &user)
            .await?;
        debug!(user_id = %user.id, "Saved user to Firebase");
        Ok(user)
    }
}

// --- Listing Repository Implementation ---

#[async_trait]
impl ListingRepository for FirebaseStorage {
    #[instrument(skip(self))]
    async fn get_all_listings(&self) -> Result<Vec<Listing>, ApplicationError> {
        let mut listings = self.fetch_listings().await?;
        sort_newest_first(&mut listings);
        debug!(count = listings.len(), "Fetched listings from Firebase");
        Ok(listings)
    }

    #[instrument(skip(self))]
    async fn get_listing(&self, id: &ListingId) -> Result<Option<Listing>, ApplicationError> {
        if !is_valid_key(id.as_str()) {
            return Ok(None);
        }
        Ok(self.get_record(LISTINGS, id.as_str()).await?)
    }

    #[instrument(skip(self, listing))]
    async fn create_listing(&self, listing: NewListing) -> Result<Listing, ApplicationError> {
        let listing = listing.into_listing(ListingId::generate(), self.clock.now());
        self.write_node(Method::PUT, &[LISTINGS, listing.id.as_str()], &listing)
            .await?;
        debug!(listing_id = %listing.id, "Saved listing to Firebase");
        Ok(listing)
    }

    /// Read, merge in process, then PATCH the whole merged record.
    /// Not atomic against concurrent writers. A malformed stored record counts
    /// as missing.
    #[instrument(skip(self, patch))]
    async fn update_listing(
        &self,
        id: &ListingId,
        patch: ListingPatch,
    ) -> Result<Option<Listing>, ApplicationError> {
        let Some(mut listing) = self.get_listing(id).await? else {
            return Ok(None);
        };
        listing.apply(patch, self.clock.now());
        self.write_node(Method::PATCH, &[LISTINGS, id.as_str()], &listing)
            .await?;
        debug!("Updated listing in Firebase");
        Ok(Some(listing))
    }

    /// Existence is checked on the raw node so malformed records can still be removed.
    #[instrument(skip(self))]
    async fn delete_listing(&self, id: &ListingId) -> Result<bool, ApplicationError> {
        if !is_valid_key(id.as_str()) {
            return Ok(false);
        }
        let url = self.node_url(&[LISTINGS, id.as_str()])?;
        if self.get_node::<Value>(url.clone()).await?.is_none() {
            return Ok(false);
        }
        self.send(Method::DELETE, url, None).await?;
        debug!("Deleted listing from Firebase");
        Ok(true)
    }

    /// Fetches the whole collection and filters in process.
    #[instrument(skip(self))]
    async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, ApplicationError> {
        let needle = query.to_lowercase();
        let hits: Vec<Listing> = self
            .fetch_listings()
            .await?
            .into_iter()
            .filter(|listing| listing.matches_lowercase(&needle))
            .collect();
        debug!(hits = hits.len(), "Searched Firebase listings");
        Ok(hits)
    }
}
