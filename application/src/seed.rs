use crate::{ApplicationError, Storage};
use domain::{ListingType, NewListing, NewUser};
use std::sync::Arc;
use tracing::{error, info, instrument};

fn photo(id: &str) -> Vec<String> {
    vec![format!(
        "https://images.unsplash.com/{id}?ixlib=rb-4.0.3&auto=format&fit=crop&w=800&h=600"
    )]
}

fn sample(
    title: &str,
    description: &str,
    price: i64,
    location: &str,
    listing_type: ListingType,
    photo_id: &str,
) -> NewListing {
    let mut listing = NewListing::new(title, description, price, location, listing_type);
    listing.images = photo(photo_id);
    listing
}

/// The demo catalog inserted into an empty store at startup.
pub fn sample_listings() -> Vec<NewListing> {
    vec![
        sample(
            "Modern Downtown Loft",
            "Stunning 2-bedroom loft with floor-to-ceiling windows and premium finishes in the heart of downtown.",
            850_000,
            "Downtown District",
            ListingType::ForSale,
            "photo-1512917774080-9991f1c4c750",
        ),
        sample(
            "Charming Family Home",
            "Beautiful 4-bedroom home with landscaped garden, perfect for families seeking comfort and space.",
            650_000,
            "Westfield Suburbs",
            ListingType::ForSale,
            "photo-1564013799919-ab600027ffc6",
        ),
        sample(
            "Oceanfront Condo",
            "Luxurious beachfront condo with panoramic ocean views and resort-style amenities.",
            4_200,
            "Coastal Heights",
            ListingType::ForRent,
            "photo-1502672260266-1c1ef2d93688",
        ),
        sample(
            "Trendy Studio Loft",
            "Stylish studio apartment in the arts district with exposed brick and modern amenities.",
            2_100,
            "Arts Quarter",
            ListingType::ForRent,
            "photo-1522708323590-d24dbb6b0267",
        ),
        sample(
            "Executive Penthouse",
            "Prestigious penthouse suite with private terrace and unmatched city views.",
            1_200_000,
            "Financial District",
            ListingType::ForSale,
            "photo-1545324418-cc1a3fa10c00",
        ),
        sample(
            "Country Farmhouse",
            "Authentic farmhouse on 3 acres with wrap-around porch and mountain views.",
            480_000,
            "Countryside Valley",
            ListingType::ForSale,
            "photo-1523217582562-09d0def993a6",
        ),
        sample(
            "Modern Townhouse",
            "Contemporary 3-story townhouse with garage and private backyard in desirable neighborhood.",
            3_500,
            "Midtown Commons",
            ListingType::ForRent,
            "photo-1582268611958-ebfd161ef9cf",
        ),
        sample(
            "Garden Cottage",
            "Charming cottage surrounded by mature gardens, perfect for those seeking tranquility.",
            390_000,
            "Rose Hill District",
            ListingType::ForSale,
            "photo-1448630360428-65456885c650",
        ),
    ]
}

/// Startup data: the admin account and the demo catalog.
pub struct SeedService {
    storage: Arc<dyn Storage>,
}

impl SeedService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Creates the admin account unless a user with that name exists.
    /// Returns whether an account was created.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, ApplicationError> {
        let created = self
            .storage
            .create_user_if_absent(NewUser {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .inspect_err(|e| error!("Error creating admin user: {}", e))?;

        match created {
            Some(user) => {
                info!(user_id = %user.id, "Admin user created");
                Ok(true)
            }
            None => {
                info!("Admin user already exists");
                Ok(false)
            }
        }
    }

    /// Inserts the sample catalog when no listings exist yet.
    /// Returns how many listings were inserted.
    #[instrument(skip(self))]
    pub async fn seed_sample_listings(&self) -> Result<usize, ApplicationError> {
        if !self.storage.get_all_listings().await?.is_empty() {
            info!("Listings already present, skipping sample data");
            return Ok(0);
        }

        let samples = sample_listings();
        let count = samples.len();
        for listing in samples {
            self.storage
                .create_listing(listing)
                .await
                .inspect_err(|e| error!("Failed to seed sample listing: {}", e))?;
        }
        info!(count, "Seeded sample listings");
        Ok(count)
    }
}
