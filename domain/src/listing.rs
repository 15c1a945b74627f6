use crate::ListingId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Whether a listing is offered for sale or for rent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingType {
    #[serde(rename = "For Sale")]
    ForSale,
    #[serde(rename = "For Rent")]
    ForRent,
}

impl ListingType {
    pub const ALL: [ListingType; 2] = [ListingType::ForSale, ListingType::ForRent];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ListingType::ForSale => "For Sale",
            ListingType::ForRent => "For Rent",
        }
    }

    /// Parses the exact wire literal. Anything else is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

fn default_coordinate() -> String {
    "0".to_string()
}

/// Treats an explicit JSON `null` the same as a missing list.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Distinguishes "key absent" (`None`) from "key present with null" (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A stored listing (property or vehicle).
///
/// Optional keys default on read because the remote store drops nulls and
/// empty arrays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub location: String,
    #[serde(default = "default_coordinate")]
    pub latitude: String,
    #[serde(default = "default_coordinate")]
    pub longitude: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[serde(default)]
    pub owners: Option<i64>,
    #[serde(default)]
    pub wheels: Option<i64>,
    #[serde(default)]
    pub year_of_manufacture: Option<i64>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Case-insensitive substring match over title, description and location.
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.location.to_lowercase().contains(needle)
    }

    /// Shallow-merges `patch` over this listing and refreshes `updated_at`.
    pub fn apply(&mut self, patch: ListingPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = longitude;
        }
        if let Some(listing_type) = patch.listing_type {
            self.listing_type = listing_type;
        }
        if let Some(owners) = patch.owners {
            self.owners = owners;
        }
        if let Some(wheels) = patch.wheels {
            self.wheels = wheels;
        }
        if let Some(year) = patch.year_of_manufacture {
            self.year_of_manufacture = year;
        }
        if let Some(contact_number) = patch.contact_number {
            self.contact_number = contact_number;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        self.updated_at = refreshed_timestamp(self.updated_at, now);
    }
}

/// Next `updated_at` value: `now`, or one microsecond past `previous` when the
/// clock has not moved forward.
pub fn refreshed_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Newest first. Equal timestamps fall back to id order.
pub fn sort_newest_first(listings: &mut [Listing]) {
    listings.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Validated payload for creating a listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub location: String,
    #[serde(default = "default_coordinate")]
    pub latitude: String,
    #[serde(default = "default_coordinate")]
    pub longitude: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[serde(default)]
    pub owners: Option<i64>,
    #[serde(default)]
    pub wheels: Option<i64>,
    #[serde(default)]
    pub year_of_manufacture: Option<i64>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
}

impl NewListing {
    /// Minimal listing with coordinates at "0" and every optional field unset.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price: i64,
        location: impl Into<String>,
        listing_type: ListingType,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            price,
            location: location.into(),
            latitude: default_coordinate(),
            longitude: default_coordinate(),
            listing_type,
            owners: None,
            wheels: None,
            year_of_manufacture: None,
            contact_number: None,
            images: Vec::new(),
        }
    }

    /// Stamps identity and creation time. `created_at == updated_at`.
    pub fn into_listing(self, id: ListingId, now: DateTime<Utc>) -> Listing {
        Listing {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            location: self.location,
            latitude: self.latitude,
            longitude: self.longitude,
            listing_type: self.listing_type,
            owners: self.owners,
            wheels: self.wheels,
            year_of_manufacture: self.year_of_manufacture,
            contact_number: self.contact_number,
            images: self.images,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves a field untouched; for the nullable fields
/// `Some(None)` clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub owners: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub wheels: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub year_of_manufacture: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample(title: &str, created: i64) -> Listing {
        NewListing::new(title, "desc", 100, "Somewhere", ListingType::ForSale)
            .into_listing(ListingId::generate(), at(created))
    }

    #[test]
    fn listing_type_accepts_only_exact_literals() {
        assert_eq!(ListingType::parse("For Sale"), Some(ListingType::ForSale));
        assert_eq!(ListingType::parse("For Rent"), Some(ListingType::ForRent));
        assert_eq!(ListingType::parse("for rent"), None);
        assert_eq!(ListingType::parse("Leased"), None);
    }

    #[test]
    fn listing_serializes_with_camel_case_and_nulls() {
        let listing = sample("Loft", 10);
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["type"], json!("For Sale"));
        assert_eq!(value["yearOfManufacture"], json!(null));
        assert_eq!(value["contactNumber"], json!(null));
        assert_eq!(value["images"], json!([]));
        assert_eq!(value["latitude"], json!("0"));
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn listing_tolerates_dropped_optional_keys() {
        let raw = json!({
            "id": "abc",
            "title": "Cabin",
            "description": "Quiet",
            "price": 10,
            "location": "Woods",
            "type": "For Rent",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let listing: Listing = serde_json::from_value(raw).unwrap();
        assert!(listing.images.is_empty());
        assert_eq!(listing.owners, None);
        assert_eq!(listing.latitude, "0");
    }

    #[test]
    fn matches_title_description_or_location() {
        let mut listing = sample("Modern Downtown Loft", 0);
        listing.location = "Arts Quarter".to_string();
        assert!(listing.matches_lowercase("loft"));
        assert!(listing.matches_lowercase("quarter"));
        assert!(listing.matches_lowercase("desc"));
        assert!(!listing.matches_lowercase("penthouse"));
    }

    #[test]
    fn apply_overwrites_only_supplied_fields() {
        let mut listing = sample("Old", 0);
        listing.owners = Some(2);
        listing.images = vec!["a.png".to_string()];
        let before = listing.clone();

        let patch = ListingPatch {
            title: Some("New".to_string()),
            owners: Some(None),
            ..Default::default()
        };
        listing.apply(patch, at(5));

        assert_eq!(listing.title, "New");
        assert_eq!(listing.owners, None);
        assert_eq!(listing.images, before.images);
        assert_eq!(listing.price, before.price);
        assert_eq!(listing.created_at, before.created_at);
        assert_eq!(listing.updated_at, at(5));
    }

    #[test]
    fn refreshed_timestamp_always_moves_forward() {
        let previous = at(100);
        assert_eq!(refreshed_timestamp(previous, at(101)), at(101));
        assert!(refreshed_timestamp(previous, at(100)) > previous);
        assert!(refreshed_timestamp(previous, at(50)) > previous);
    }

    #[test]
    fn sort_newest_first_orders_by_created_at_descending() {
        let mut listings = vec![sample("t1", 1), sample("t3", 3), sample("t2", 2)];
        sort_newest_first(&mut listings);
        let titles: Vec<_> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["t3", "t2", "t1"]);
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: ListingPatch =
            serde_json::from_value(json!({"owners": null, "title": "x"})).unwrap();
        assert_eq!(patch.owners, Some(None));
        assert_eq!(patch.wheels, None);

        let wire = serde_json::to_value(&patch).unwrap();
        assert_eq!(wire, json!({"title": "x", "owners": null}));
    }
}
