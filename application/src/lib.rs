use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Credentials, DomainError, Listing, ListingId, ListingPatch, NewListing, NewUser, User, UserId,
    UserSummary, parse_listing_patch, parse_new_listing,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub mod seed;
pub mod stats;

pub use seed::{SeedService, sample_listings};
pub use stats::{ListingStats, StatsResponse, StatsService};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Listing not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username already exists: {0}")]
    UsernameTaken(String),
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

// --- Time Source ---

/// Source of "now" for entity timestamps.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that advances by one second on every reading.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug)]
pub struct SteppingClock {
    start: DateTime<Utc>,
    ticks: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "test-support"))]
impl SteppingClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            ticks: std::sync::atomic::AtomicI64::new(0),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for SteppingClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(19_000))
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self
            .ticks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.start + chrono::Duration::seconds(tick)
    }
}

// --- Storage Interfaces (Traits) ---

/// Storage for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Point lookup by primary key.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, ApplicationError>;
    /// First user whose username matches exactly.
    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<User>, ApplicationError>;
    /// Persists a new user under a freshly generated id. Does not check username uniqueness.
    async fn create_user(&self, user: NewUser) -> Result<User, ApplicationError>;
    /// Creates the user unless the username is taken (`Ok(None)`).
    ///
    /// The default is a plain read followed by a write, so two concurrent calls
    /// may both succeed. Backends that can do better override it.
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user_if_absent(
        &self,
        user: NewUser,
    ) -> Result<Option<User>, ApplicationError> {
        debug!("Checking username before create via default check-then-create");
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Ok(None);
        }
        self.create_user(user).await.map(Some)
    }
}

/// Storage and text search for listings.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// All listings, newest `created_at` first.
    async fn get_all_listings(&self) -> Result<Vec<Listing>, ApplicationError>;
    async fn get_listing(&self, id: &ListingId) -> Result<Option<Listing>, ApplicationError>;
    /// Assigns id and timestamps, persists, returns the stored entity.
    async fn create_listing(&self, listing: NewListing) -> Result<Listing, ApplicationError>;
    /// Merges `patch` over the stored record. `Ok(None)` when the id is unknown.
    async fn update_listing(
        &self,
        id: &ListingId,
        patch: ListingPatch,
    ) -> Result<Option<Listing>, ApplicationError>;
    /// Returns whether a record existed and was removed.
    async fn delete_listing(&self, id: &ListingId) -> Result<bool, ApplicationError>;
    /// Case-insensitive substring match on title, description and location.
    /// Result order is unspecified.
    async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, ApplicationError>;
}

/// The full storage contract shared by every backend.
pub trait Storage: UserRepository + ListingRepository {}

impl<T: UserRepository + ListingRepository + ?Sized> Storage for T {}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub user: UserSummary,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Contact form submission. Only logged, never stored.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
}

// --- Application Services (Use Cases) ---

/// Login and signup against the user store.
pub struct AuthService {
    storage: Arc<dyn Storage>,
}

impl AuthService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: Credentials) -> Result<UserSummary, ApplicationError> {
        info!("Attempting login");
        let attempt = credentials.validate()?;

        let user = self
            .storage
            .get_user_by_username(&attempt.username)
            .await
            .inspect_err(|e| error!("Failed to look up user: {}", e))?;

        match user {
            Some(user) if user.verify_password(&attempt.password) => {
                info!(user_id = %user.id, "Login succeeded");
                Ok(UserSummary::from(&user))
            }
            _ => {
                warn!("Login rejected: invalid credentials");
                Err(ApplicationError::InvalidCredentials)
            }
        }
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn signup(&self, credentials: Credentials) -> Result<UserSummary, ApplicationError> {
        info!("Attempting signup");
        let new_user = credentials.validate()?;
        let username = new_user.username.clone();

        match self
            .storage
            .create_user_if_absent(new_user)
            .await
            .inspect_err(|e| error!("Failed to create user: {}", e))?
        {
            Some(user) => {
                info!(user_id = %user.id, "User created");
                Ok(UserSummary::from(&user))
            }
            None => {
                warn!("Signup rejected: username already exists");
                Err(ApplicationError::UsernameTaken(username))
            }
        }
    }
}

/// CRUD over listings.
pub struct ListingService {
    storage: Arc<dyn Storage>,
}

impl ListingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[instrument(skip(self))]
    pub async fn list_listings(&self) -> Result<Vec<Listing>, ApplicationError> {
        let listings = self
            .storage
            .get_all_listings()
            .await
            .inspect_err(|e| error!("Failed to fetch listings: {}", e))?;
        debug!(count = listings.len(), "Fetched all listings");
        Ok(listings)
    }

    #[instrument(skip(self))]
    pub async fn get_listing(&self, id: &str) -> Result<Listing, ApplicationError> {
        let listing_id = ListingId::new(id.to_string());
        self.storage
            .get_listing(&listing_id)
            .await
            .inspect_err(|e| error!(listing_id = %id, "Failed to fetch listing: {}", e))?
            .ok_or_else(|| {
                warn!(listing_id = %id, "Listing not found");
                ApplicationError::NotFound(id.to_string())
            })
    }

    /// Validates the raw payload, then persists it.
    #[instrument(skip(self, payload))]
    pub async fn create_listing(&self, payload: Value) -> Result<Listing, ApplicationError> {
        info!("Attempting to create listing");
        let new_listing = parse_new_listing(payload).inspect_err(|e| {
            warn!("Listing payload failed validation: {}", e);
        })?;

        let listing = self
            .storage
            .create_listing(new_listing)
            .await
            .inspect_err(|e| error!("Failed to create listing: {}", e))?;
        info!(listing_id = %listing.id, "Listing created");
        Ok(listing)
    }

    #[instrument(skip(self, payload))]
    pub async fn update_listing(&self, id: &str, payload: Value) -> Result<Listing, ApplicationError> {
        info!("Attempting to update listing");
        let patch = parse_listing_patch(payload).inspect_err(|e| {
            warn!(listing_id = %id, "Listing update failed validation: {}", e);
        })?;

        let listing_id = ListingId::new(id.to_string());
        match self
            .storage
            .update_listing(&listing_id, patch)
            .await
            .inspect_err(|e| error!(listing_id = %id, "Failed to update listing: {}", e))?
        {
            Some(listing) => {
                info!(listing_id = %id, "Listing updated");
                Ok(listing)
            }
            None => {
                warn!(listing_id = %id, "Update failed: listing not found");
                Err(ApplicationError::NotFound(id.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_listing(&self, id: &str) -> Result<(), ApplicationError> {
        info!("Attempting to delete listing");
        let listing_id = ListingId::new(id.to_string());
        let deleted = self
            .storage
            .delete_listing(&listing_id)
            .await
            .inspect_err(|e| error!(listing_id = %id, "Failed to delete listing: {}", e))?;
        if deleted {
            info!(listing_id = %id, "Listing deleted");
            Ok(())
        } else {
            warn!(listing_id = %id, "Deletion failed: listing not found");
            Err(ApplicationError::NotFound(id.to_string()))
        }
    }
}

/// Free-text search over listings.
pub struct SearchService {
    storage: Arc<dyn Storage>,
}

impl SearchService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Rejects a blank query with `InvalidInput`; otherwise the raw query is matched.
    #[instrument(skip(self))]
    pub async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, ApplicationError> {
        if query.trim().is_empty() {
            return Err(ApplicationError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let results = self
            .storage
            .search_listings(query)
            .await
            .inspect_err(|e| error!(query = %query, "Search failed: {}", e))?;
        info!(query = %query, hits = results.len(), "Search successful");
        Ok(results)
    }
}

/// Accepts contact form submissions and logs them.
#[derive(Debug, Default)]
pub struct ContactService;

impl ContactService {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, request))]
    pub fn submit(&self, request: ContactRequest) -> Result<(), ApplicationError> {
        if [&request.name, &request.email, &request.message]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            warn!("Contact submission rejected: missing required fields");
            return Err(ApplicationError::InvalidInput(
                "Name, email, and message are required".to_string(),
            ));
        }

        info!(
            name = %request.name,
            email = %request.email,
            phone = ?request.phone,
            listing_id = ?request.listing_id,
            message = %request.message,
            "Contact form submission"
        );
        Ok(())
    }
}
