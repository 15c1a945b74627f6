use crate::{DomainError, ListingPatch, ListingType, NewListing};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

// --- Schema Definition ---

/// The kind of value a listing field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// JSON integer (no fractional part).
    Integer,
    /// One of the `ListingType` literals.
    ListingType,
    /// Array of strings.
    TextList,
}

/// Defines a single field of the listing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present (and non-null) on create.
    pub required: bool,
    /// Accepts an explicit `null`.
    pub nullable: bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool, nullable: bool) -> FieldDefinition {
    FieldDefinition {
        name,
        kind,
        required,
        nullable,
    }
}

/// Inbound listing fields. `id`, `createdAt` and `updatedAt` are server-assigned
/// and not part of the schema; unknown keys are ignored.
pub const LISTING_SCHEMA: &[FieldDefinition] = &[
    field("title", FieldKind::Text, true, false),
    field("description", FieldKind::Text, true, false),
    field("price", FieldKind::Integer, true, false),
    field("location", FieldKind::Text, true, false),
    field("latitude", FieldKind::Text, false, false),
    field("longitude", FieldKind::Text, false, false),
    field("type", FieldKind::ListingType, true, false),
    field("owners", FieldKind::Integer, false, true),
    field("wheels", FieldKind::Integer, false, true),
    field("yearOfManufacture", FieldKind::Integer, false, true),
    field("contactNumber", FieldKind::Text, false, true),
    field("images", FieldKind::TextList, false, true),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full payload: required fields must be present.
    Create,
    /// Any subset of fields.
    Update,
}

// --- Validation Errors ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Every field problem found in one payload.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

// --- Validation ---

fn check_kind(kind: FieldKind, value: &Value) -> Result<(), String> {
    match kind {
        FieldKind::Text => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("Expected a text string, got {}", value))
            }
        }
        FieldKind::Integer => {
            if value.as_i64().is_some() {
                Ok(())
            } else {
                Err(format!("Expected an integer, got {}", value))
            }
        }
        FieldKind::ListingType => match value.as_str().and_then(ListingType::parse) {
            Some(_) => Ok(()),
            None => Err(format!(
                "Expected one of \"For Sale\", \"For Rent\", got {}",
                value
            )),
        },
        FieldKind::TextList => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => Ok(()),
            _ => Err(format!("Expected an array of strings, got {}", value)),
        },
    }
}

/// Checks a raw JSON payload against `LISTING_SCHEMA`, collecting every error.
pub fn validate_listing_payload(payload: &Value, mode: ValidationMode) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let Some(object) = payload.as_object() else {
        errors.push("body", "Expected a JSON object");
        return Err(errors);
    };

    for def in LISTING_SCHEMA {
        match object.get(def.name) {
            None => {
                if mode == ValidationMode::Create && def.required {
                    errors.push(def.name, "Required");
                }
            }
            Some(Value::Null) => {
                if !def.nullable {
                    errors.push(def.name, "Must not be null");
                }
            }
            Some(value) => {
                if let Err(reason) = check_kind(def.kind, value) {
                    errors.push(def.name, reason);
                }
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validates and converts a create payload.
pub fn parse_new_listing(payload: Value) -> Result<NewListing, DomainError> {
    validate_listing_payload(&payload, ValidationMode::Create).map_err(DomainError::Validation)?;
    serde_json::from_value(payload).map_err(|e| DomainError::InvalidFieldValue {
        field: "body".to_string(),
        reason: e.to_string(),
    })
}

/// Validates and converts an update payload.
pub fn parse_listing_patch(payload: Value) -> Result<ListingPatch, DomainError> {
    validate_listing_payload(&payload, ValidationMode::Update).map_err(DomainError::Validation)?;
    serde_json::from_value(payload).map_err(|e| DomainError::InvalidFieldValue {
        field: "body".to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "title": "Modern Downtown Loft",
            "description": "Stunning loft",
            "price": 850000,
            "location": "Downtown District",
            "type": "For Sale",
            "images": ["https://example.com/a.jpg"]
        })
    }

    #[test]
    fn schema_has_unique_field_names() {
        let mut names: Vec<_> = LISTING_SCHEMA.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), LISTING_SCHEMA.len());
        assert!(!names.contains(&"id"));
    }

    #[test]
    fn create_payload_parses_with_defaults() {
        let listing = parse_new_listing(valid_payload()).unwrap();
        assert_eq!(listing.listing_type, ListingType::ForSale);
        assert_eq!(listing.latitude, "0");
        assert_eq!(listing.longitude, "0");
        assert_eq!(listing.owners, None);
        assert_eq!(listing.images.len(), 1);
    }

    #[test]
    fn create_ignores_unknown_and_server_assigned_keys() {
        let mut payload = valid_payload();
        payload["id"] = json!("attacker-chosen");
        payload["bedrooms"] = json!(3);
        assert!(parse_new_listing(payload).is_ok());
    }

    #[test]
    fn create_reports_every_missing_required_field() {
        let result = validate_listing_payload(&json!({"title": "Only a title"}), ValidationMode::Create);
        let errors = result.unwrap_err();
        for field in ["description", "price", "location", "type"] {
            assert!(errors.contains_field(field), "missing error for {field}");
        }
        assert!(!errors.contains_field("title"));
    }

    #[rstest]
    #[case::type_outside_enum("type", json!("Leased"))]
    #[case::type_wrong_case("type", json!("for sale"))]
    #[case::fractional_price("price", json!(10.5))]
    #[case::price_as_text("price", json!("cheap"))]
    #[case::owners_as_text("owners", json!("two"))]
    #[case::images_with_numbers("images", json!([1, 2]))]
    #[case::null_title("title", json!(null))]
    #[case::null_latitude("latitude", json!(null))]
    fn create_rejects_bad_field(#[case] field: &str, #[case] value: Value) {
        let mut payload = valid_payload();
        payload[field] = value;
        let result = parse_new_listing(payload);
        assert!(
            matches!(result, Err(DomainError::Validation(ref errors)) if errors.contains_field(field)),
            "expected validation error on {field}, got {result:?}"
        );
    }

    #[test]
    fn nullable_fields_accept_null_on_create() {
        let mut payload = valid_payload();
        payload["owners"] = json!(null);
        payload["contactNumber"] = json!(null);
        payload["images"] = json!(null);
        let listing = parse_new_listing(payload).unwrap();
        assert!(listing.images.is_empty());
        assert_eq!(listing.contact_number, None);
    }

    #[test]
    fn update_accepts_any_subset() {
        let patch = parse_listing_patch(json!({"price": 1})).unwrap();
        assert_eq!(patch.price, Some(1));
        assert_eq!(patch.title, None);
        assert!(parse_listing_patch(json!({})).is_ok());
    }

    #[test]
    fn update_still_checks_types() {
        let result = parse_listing_patch(json!({"type": "Auction"}));
        assert!(matches!(result, Err(DomainError::Validation(errors)) if errors.contains_field("type")));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let result = validate_listing_payload(&json!([1, 2, 3]), ValidationMode::Update);
        assert!(result.unwrap_err().contains_field("body"));
    }

    #[test]
    fn validation_errors_display_lists_fields() {
        let errors = validate_listing_payload(&json!({"price": "x"}), ValidationMode::Update).unwrap_err();
        assert_eq!(errors.to_string(), "price: Expected an integer, got \"x\"");
    }
}
