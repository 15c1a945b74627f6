use serde::{Deserialize, Serialize}; // For entity identifiers on the wire
use std::fmt;
use thiserror::Error; // For domain-specific errors
use uuid::Uuid;

pub mod listing;
pub mod schema;
pub mod user;

pub use listing::{
    Listing, ListingPatch, ListingType, NewListing, refreshed_timestamp, sort_newest_first,
};
pub use schema::{
    FieldDefinition, FieldError, FieldKind, LISTING_SCHEMA, ValidationErrors, ValidationMode,
    parse_listing_patch, parse_new_listing, validate_listing_payload,
};
pub use user::{Credentials, NewUser, User, UserSummary};

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Invalid listing data: {0}")]
    Validation(ValidationErrors),
    #[error("Invalid field value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },
    #[error("Missing required field '{0}'")]
    MissingField(String),
}

// --- Identifiers ---

/// Primary key of a listing. Generated once at creation and never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: String) -> Self {
        Self(id)
    }
    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for ListingId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl From<ListingId> for String {
    fn from(id: ListingId) -> Self {
        id.0
    }
}
impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primary key of a user account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: String) -> Self {
        Self(id)
    }
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = ListingId::generate();
        let b = ListingId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn ids_serialize_as_bare_strings() {
        let id = UserId::new("abc".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: ListingId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(back.to_string(), "xyz");
    }
}
