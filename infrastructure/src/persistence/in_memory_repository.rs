use application::{ApplicationError, Clock, ListingRepository, SystemClock, UserRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use domain::{
    Listing, ListingId, ListingPatch, NewListing, NewUser, User, UserId, sort_newest_first,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Process-local storage backed by concurrent maps.
///
/// Cloning shares the underlying maps, so one instance can be handed to
/// several services.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    users: Arc<DashMap<UserId, Arc<User>>>,
    listings: Arc<DashMap<ListingId, Arc<Listing>>>,
    // Serializes the username check and insert in `create_user_if_absent`
    signup_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            listings: Arc::new(DashMap::new()),
            signup_lock: Arc::new(Mutex::new(())),
            clock,
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }
}

// --- User Repository Implementation ---

#[async_trait]
impl UserRepository for InMemoryStorage {
    #[instrument(skip(self))]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, ApplicationError> {
        debug!("Getting user from in-memory store");
        Ok(self.users.get(id).map(|user_ref| (**user_ref).clone()))
    }

    #[instrument(skip(self))]
    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, ApplicationError> {
        debug!("Scanning in-memory users for username");
        let user = self
            .users
            .iter()
            .find(|entry| entry.value().username == username)
            .map(|entry| (**entry.value()).clone());
        Ok(user)
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: NewUser) -> Result<User, ApplicationError> {
        let user = user.into_user(UserId::generate());
        debug!(user_id = %user.id, "Saving user to in-memory store");
        self.users.insert(user.id.clone(), Arc::new(user.clone()));
        Ok(user)
    }

    /// Atomic with respect to other calls of this method.
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user_if_absent(
        &self,
        user: NewUser,
    ) -> Result<Option<User>, ApplicationError> {
        let _guard = self.signup_lock.lock().await;
        if self.get_user_by_username(&user.username).await?.is_some() {
            debug!("Username already present in in-memory store");
            return Ok(None);
        }
        self.create_user(user).await.map(Some)
    }
}

// --- Listing Repository Implementation ---

#[async_trait]
impl ListingRepository for InMemoryStorage {
    #[instrument(skip(self))]
    async fn get_all_listings(&self) -> Result<Vec<Listing>, ApplicationError> {
        let mut listings: Vec<Listing> = self
            .listings
            .iter()
            .map(|entry| (**entry.value()).clone())
            .collect();
        sort_newest_first(&mut listings);
        debug!(count = listings.len(), "Listed listings from in-memory store");
        Ok(listings)
    }

    #[instrument(skip(self))]
    async fn get_listing(&self, id: &ListingId) -> Result<Option<Listing>, ApplicationError> {
        debug!("Getting listing from in-memory store");
        Ok(self.listings.get(id).map(|listing_ref| (**listing_ref).clone()))
    }

    #[instrument(skip(self, listing))]
    async fn create_listing(&self, listing: NewListing) -> Result<Listing, ApplicationError> {
        let listing = listing.into_listing(ListingId::generate(), self.clock.now());
        debug!(listing_id = %listing.id, "Saving listing to in-memory store");
        self.listings
            .insert(listing.id.clone(), Arc::new(listing.clone()));
        Ok(listing)
    }

    #[instrument(skip(self, patch))]
    async fn update_listing(
        &self,
        id: &ListingId,
        patch: ListingPatch,
    ) -> Result<Option<Listing>, ApplicationError> {
        // The entry guard holds the shard lock for the whole read-merge-write
        let Some(mut entry) = self.listings.get_mut(id) else {
            debug!("Listing not present in in-memory store");
            return Ok(None);
        };
        let mut updated = (**entry).clone();
        updated.apply(patch, self.clock.now());
        *entry = Arc::new(updated.clone());
        debug!("Updated listing in in-memory store");
        Ok(Some(updated))
    }

    #[instrument(skip(self))]
    async fn delete_listing(&self, id: &ListingId) -> Result<bool, ApplicationError> {
        debug!("Deleting listing from in-memory store");
        Ok(self.listings.remove(id).is_some())
    }

    #[instrument(skip(self))]
    async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, ApplicationError> {
        let needle = query.to_lowercase();
        let hits: Vec<Listing> = self
            .listings
            .iter()
            .filter(|entry| entry.value().matches_lowercase(&needle))
            .map(|entry| (**entry.value()).clone())
            .collect();
        debug!(hits = hits.len(), "Searched in-memory listings");
        Ok(hits)
    }
}
