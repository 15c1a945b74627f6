use crate::{ApplicationError, Storage};
use domain::{Listing, ListingType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::{MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::{debug, error, info, instrument};

/// Catalog figures shown on the admin dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    pub total: usize,
    pub for_sale: usize,
    pub for_rent: usize,
    /// Mean price rounded to the nearest integer; 0 for an empty catalog.
    pub average_price: i64,
}

impl ListingStats {
    pub fn from_listings(listings: &[Listing]) -> Self {
        let total = listings.len();
        let for_sale = listings
            .iter()
            .filter(|l| l.listing_type == ListingType::ForSale)
            .count();
        let average_price = if total == 0 {
            0
        } else {
            let sum: i128 = listings.iter().map(|l| i128::from(l.price)).sum();
            (sum as f64 / total as f64).round() as i64
        };
        Self {
            total,
            for_sale,
            for_rent: total - for_sale,
            average_price,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    /// Resident memory of this server process.
    pub process_used_bytes: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os_name: String,
    pub os_version: String,
}

/// Response for the stats endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub listings: ListingStats,
    pub memory: MemoryStats,
    pub system_info: SystemInfo,
}

pub struct StatsService {
    storage: Arc<dyn Storage>,
}

impl StatsService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<StatsResponse, ApplicationError> {
        info!("Gathering listing and system statistics");

        let listings = self
            .storage
            .get_all_listings()
            .await
            .inspect_err(|e| error!("Failed to fetch listings for stats: {}", e))?;
        let listing_stats = ListingStats::from_listings(&listings);
        debug!(?listing_stats, "Listing stats gathered");

        // sysinfo calls block, keep them off the async workers
        let (memory, system_info) = tokio::task::spawn_blocking(|| {
            let mut sys = System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
            );
            let current_pid = Pid::from_u32(std::process::id());
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[current_pid]),
                true,
                ProcessRefreshKind::nothing().with_memory(),
            );
            let process_memory = sys.process(current_pid).map_or(0, |p| p.memory());

            let memory = MemoryStats {
                total_bytes: sys.total_memory(),
                used_bytes: sys.used_memory(),
                available_bytes: sys.available_memory(),
                process_used_bytes: process_memory,
            };
            let system_info = SystemInfo {
                os_name: System::name().unwrap_or_else(|| "Unknown OS".to_string()),
                os_version: System::os_version().unwrap_or_else(|| "Unknown Version".to_string()),
            };
            (memory, system_info)
        })
        .await
        .map_err(|e| {
            ApplicationError::InfrastructureError(format!(
                "System stat gathering task failed: {}",
                e // JoinError
            ))
        })?;

        Ok(StatsResponse {
            listings: listing_stats,
            memory,
            system_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{ListingId, NewListing};
    use rstest::rstest;

    fn listing(price: i64, listing_type: ListingType) -> Listing {
        NewListing::new("t", "d", price, "l", listing_type)
            .into_listing(ListingId::generate(), Utc::now())
    }

    #[test]
    fn empty_catalog_has_zero_average() {
        assert_eq!(ListingStats::from_listings(&[]), ListingStats::default());
    }

    #[test]
    fn counts_types_and_rounds_average() {
        let listings = vec![
            listing(100, ListingType::ForSale),
            listing(200, ListingType::ForRent),
            listing(201, ListingType::ForRent),
        ];
        let stats = ListingStats::from_listings(&listings);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.for_sale, 1);
        assert_eq!(stats.for_rent, 2);
        assert_eq!(stats.average_price, 167);
    }

    #[rstest]
    #[case::single(&[450_000], 450_000)]
    #[case::exact_mean(&[100, 300], 200)]
    #[case::half_rounds_up(&[100, 101], 101)]
    #[case::below_half_rounds_down(&[1, 1, 2], 1)]
    #[case::above_half_rounds_up(&[1, 2, 2], 2)]
    fn average_price_is_rounded_to_nearest(#[case] prices: &[i64], #[case] expected: i64) {
        let listings: Vec<Listing> = prices
            .iter()
            .map(|&price| listing(price, ListingType::ForSale))
            .collect();
        assert_eq!(ListingStats::from_listings(&listings).average_price, expected);
    }
}
