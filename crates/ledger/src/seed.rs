//! Synthetic demo data.
//!
//! Wipes every table, then generates users, shops, deliveries with
//! realistic timelines, complaints for disputed deliveries and trust
//! history, and refreshes the dashboard metrics snapshot. Seeded rows are
//! not mirrored on chain.

use alloy::primitives::Address;
use annsuraksha_core::{DeliveryItem, DeliveryStatus, Priority, Role};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::password::hash_password;
use crate::storage::{
    DashboardMetrics, NewComplaint, NewDelivery, NewFps, NewUser, Storage,
};

/// Password shared by every generated account.
pub const SEED_PASSWORD: &str = "Password@123";

const FIRST_NAMES: &[&str] = &[
    "Aarav", "Vivaan", "Aditya", "Ananya", "Diya", "Ishaan", "Kavya", "Meera", "Rohan", "Saanvi",
    "Arjun", "Lakshmi", "Priya", "Rahul", "Sneha", "Vikram", "Pooja", "Karan", "Nisha", "Suresh",
];

const LAST_NAMES: &[&str] = &[
    "Sharma", "Verma", "Iyer", "Reddy", "Patel", "Nair", "Gupta", "Singh", "Das", "Kulkarni",
    "Menon", "Joshi", "Chatterjee", "Rao", "Mehta",
];

const SHOP_SUFFIXES: &[&str] = &["Ration Store", "Fair Price Shop", "Co-operative Store", "Traders"];

// City, latitude, longitude.
const CITIES: &[(&str, f64, f64)] = &[
    ("Mumbai", 19.0760, 72.8777),
    ("Delhi", 28.6139, 77.2090),
    ("Bangalore", 12.9716, 77.5946),
    ("Hyderabad", 17.3850, 78.4867),
    ("Chennai", 13.0827, 80.2707),
];

const STATES: &[&str] = &["Maharashtra", "Karnataka", "Tamil Nadu", "Uttar Pradesh"];

// Name, unit, quantity range.
const ITEMS: &[(&str, &str, u32, u32)] = &[
    ("Rice", "kg", 5, 10),
    ("Wheat", "kg", 5, 10),
    ("Sugar", "kg", 2, 5),
    ("Kerosene", "liters", 2, 5),
];

const COMPLAINTS: &[(&str, &str)] = &[
    ("Received less quantity than ordered", "shortage"),
    ("Poor quality items received", "quality"),
    ("Delivery was extremely late", "delay"),
    ("Items were damaged during delivery", "damage"),
    ("Wrong items were delivered", "wrong_items"),
];

const TRUST_REASONS: &[&str] = &[
    "Delivery completed",
    "Complaint resolved",
    "Late delivery penalty",
    "Quality issue reported",
    "Positive feedback reward",
];

// Pending, Delivered, Disputed.
const STATUS_WEIGHTS: [(DeliveryStatus, u32); 3] = [
    (DeliveryStatus::Pending, 3),
    (DeliveryStatus::Delivered, 6),
    (DeliveryStatus::Disputed, 1),
];

/// How much to generate.
#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    /// Users; the first is always an admin.
    pub users: usize,
    /// Fair Price Shops.
    pub fps: usize,
    /// Deliveries.
    pub deliveries: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            users: 50,
            fps: 15,
            deliveries: 200,
        }
    }
}

/// What [`seed`] wrote.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    /// Users created.
    pub users: usize,
    /// Of which dealers.
    pub dealers: usize,
    /// Of which beneficiaries.
    pub beneficiaries: usize,
    /// Shops created.
    pub fps: usize,
    /// Deliveries created.
    pub deliveries: usize,
    /// Complaints created.
    pub complaints: usize,
    /// Trust history records created.
    pub trust_records: usize,
    /// Dashboard snapshot after seeding.
    pub metrics: DashboardMetrics,
}

struct Shop {
    code: String,
    dealer_id: Option<i64>,
    latitude: f64,
    longitude: f64,
}

/// Replace the database contents with generated demo data.
pub async fn seed<R: Rng>(storage: &Storage, options: &SeedOptions, rng: &mut R) -> Result<SeedReport> {
    storage
        .clear_all()
        .await
        .context("Failed to clear existing data")?;
    info!("Cleared existing data");

    let now = Utc::now();
    let password_hash = hash_password(SEED_PASSWORD)?;

    let mut beneficiaries: Vec<(i64, u8)> = Vec::new();
    let mut dealers: Vec<i64> = Vec::new();
    let mut aadhar_numbers = HashSet::new();

    for i in 0..options.users {
        let role = if i == 0 {
            Role::Admin
        } else if rng.gen_bool(0.25) {
            Role::Dealer
        } else {
            Role::Beneficiary
        };

        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Asha");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Devi");
        let trust_score = if role == Role::Beneficiary {
            rng.gen_range(40..=100)
        } else {
            100
        };

        let aadhar = loop {
            let candidate = format!(
                "{} {} {}",
                rng.gen_range(1000..=9999),
                rng.gen_range(1000..=9999),
                rng.gen_range(1000..=9999)
            );
            if aadhar_numbers.insert(candidate.clone()) {
                break candidate;
            }
        };

        let user = NewUser {
            name: format!("{} {}", first, last),
            email: format!(
                "{}.{}{}@example.com",
                first.to_lowercase(),
                last.to_lowercase(),
                i + 1
            ),
            password_hash: password_hash.clone(),
            role,
            trust_score,
            aadhar_number: Some(aadhar),
            wallet_address: Some(Address::from(rng.gen::<[u8; 20]>())),
            phone: Some(format!("9{}", rng.gen_range(100_000_000..=999_999_999u32))),
            created_at: now - Duration::days(rng.gen_range(1..=365)),
        };
        let id = storage.insert_user(&user).await?;
        storage
            .set_last_login(id, now - Duration::hours(rng.gen_range(1..=72)))
            .await?;

        match role {
            Role::Beneficiary => beneficiaries.push((id, trust_score)),
            Role::Dealer => dealers.push(id),
            Role::Admin => {}
        }
    }
    info!(
        "Generated {} users ({} dealers, {} beneficiaries)",
        options.users,
        dealers.len(),
        beneficiaries.len()
    );

    let mut shops = Vec::with_capacity(options.fps);
    let mut codes = HashSet::new();
    for _ in 0..options.fps {
        let code = loop {
            let candidate = format!("FPS{:06}", rng.gen_range(0..1_000_000));
            if codes.insert(candidate.clone()) {
                break candidate;
            }
        };
        let &(city, lat, lon) = CITIES.choose(rng).unwrap_or(&CITIES[0]);
        let latitude = lat + rng.gen_range(-0.05..0.05);
        let longitude = lon + rng.gen_range(-0.05..0.05);
        let dealer_id = dealers.choose(rng).copied();

        storage
            .upsert_fps(&NewFps {
                fps_code: code.clone(),
                name: format!(
                    "{} {}",
                    LAST_NAMES.choose(rng).copied().unwrap_or("Janata"),
                    SHOP_SUFFIXES.choose(rng).copied().unwrap_or("Store")
                ),
                dealer_id,
                city: Some(city.to_string()),
                state: STATES.choose(rng).map(|s| s.to_string()),
                latitude: Some(latitude),
                longitude: Some(longitude),
                created_at: now - Duration::days(rng.gen_range(1..=365)),
            })
            .await?;

        shops.push(Shop {
            code,
            dealer_id,
            latitude,
            longitude,
        });
    }
    info!("Generated {} FPS shops", shops.len());

    let weights = WeightedIndex::new(STATUS_WEIGHTS.iter().map(|(_, w)| *w))
        .context("Invalid status weights")?;
    let mut delivery_count = 0;
    let mut complaint_count = 0;

    if !beneficiaries.is_empty() && !shops.is_empty() {
        for _ in 0..options.deliveries {
            let Some(&(user_id, _)) = beneficiaries.choose(rng) else {
                break;
            };
            let Some(shop) = shops.choose(rng) else {
                break;
            };
            let status = STATUS_WEIGHTS[weights.sample(rng)].0;

            let delivery_time = now
                - Duration::days(rng.gen_range(1..=30))
                - Duration::minutes(rng.gen_range(0..24 * 60));
            let (collection_time, dispute_time) = match status {
                DeliveryStatus::Delivered => (
                    Some(delivery_time + Duration::hours(rng.gen_range(1..=72))),
                    None,
                ),
                DeliveryStatus::Disputed => {
                    let collected = delivery_time + Duration::hours(rng.gen_range(1..=72));
                    (
                        Some(collected),
                        Some(collected + Duration::hours(rng.gen_range(1..=24))),
                    )
                }
                _ => (None, None),
            };

            let id = storage
                .insert_delivery(&NewDelivery {
                    user_id,
                    dealer_id: shop.dealer_id,
                    fps_code: shop.code.clone(),
                    location: format!("{:.4},{:.4}", shop.latitude, shop.longitude),
                    amount: rng.gen_range(500..=1500),
                    items: random_items(rng),
                    ipfs_hash: None,
                    status,
                    delivery_time,
                    collection_time,
                    dispute_time,
                    blockchain_delivery_id: None,
                    tx_hash: None,
                    created_at: delivery_time,
                })
                .await?;
            storage
                .record_fps_delivery(&shop.code, shop.dealer_id, delivery_time)
                .await?;
            delivery_count += 1;

            if let Some(disputed_at) = dispute_time {
                insert_complaint(storage, id, user_id, disputed_at, rng).await?;
                complaint_count += 1;
            }
        }
    }
    info!(
        "Generated {} deliveries and {} complaints",
        delivery_count, complaint_count
    );

    let mut trust_records = 0;
    for &(user_id, current) in &beneficiaries {
        trust_records += insert_trust_history(storage, user_id, current, now, rng).await?;
    }
    info!(
        "Generated {} trust records for {} beneficiaries",
        trust_records,
        beneficiaries.len()
    );

    let metrics = storage.refresh_metrics_snapshot().await?;
    info!("Updated dashboard metrics");

    Ok(SeedReport {
        users: options.users,
        dealers: dealers.len(),
        beneficiaries: beneficiaries.len(),
        fps: shops.len(),
        deliveries: delivery_count,
        complaints: complaint_count,
        trust_records,
        metrics,
    })
}

fn random_items<R: Rng>(rng: &mut R) -> Vec<DeliveryItem> {
    let count = rng.gen_range(1..=3);
    ITEMS
        .choose_multiple(rng, count)
        .map(|&(name, unit, lo, hi)| DeliveryItem {
            name: name.to_string(),
            quantity: rng.gen_range(lo..=hi) as f64,
            unit: unit.to_string(),
        })
        .collect::<Vec<_>>()
}

async fn insert_complaint<R: Rng>(
    storage: &Storage,
    delivery_id: i64,
    user_id: i64,
    at: DateTime<Utc>,
    rng: &mut R,
) -> Result<()> {
    let &(text, category) = COMPLAINTS.choose(rng).unwrap_or(&COMPLAINTS[0]);
    let severity = (rng.gen_range(0.6..=0.9) * 100.0_f64).round() / 100.0;
    let priority = *[Priority::High, Priority::Medium, Priority::Low]
        .choose(rng)
        .unwrap_or(&Priority::Medium);

    storage
        .insert_complaint(&NewComplaint {
            delivery_id,
            user_id,
            text: text.to_string(),
            category: category.to_string(),
            severity,
            priority,
            tx_hash: None,
            created_at: at,
        })
        .await?;
    Ok(())
}

/// Write 3..=10 records ending at the user's current score.
///
/// Records are generated newest first by walking the score backwards, so
/// every record's `old_score` and `new_score` chain and the newest
/// `new_score` equals `current`.
async fn insert_trust_history<R: Rng>(
    storage: &Storage,
    user_id: i64,
    current: u8,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<usize> {
    let entries = rng.gen_range(3..=10);
    let mut ages: Vec<i64> = rand::seq::index::sample(rng, 90 * 24, entries)
        .into_iter()
        .map(|i| i as i64 + 1)
        .collect();
    ages.sort_unstable();

    let mut new_score = current as i32;
    for age_hours in ages {
        let change: i32 = rng.gen_range(-10..=10);
        let old_score = (new_score - change).clamp(0, 100);
        let reason = TRUST_REASONS.choose(rng).copied().unwrap_or("Delivery completed");

        storage
            .insert_trust_record(
                user_id,
                old_score as u8,
                new_score as u8,
                new_score - old_score,
                reason,
                now - Duration::hours(age_hours),
            )
            .await?;
        new_score = old_score;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;
    use crate::storage::test_support::storage;
    use rand::{rngs::StdRng, SeedableRng};

    #[tokio::test]
    async fn test_seed_small_dataset() {
        let (storage, _temp_db) = storage().await;
        let mut rng = StdRng::seed_from_u64(42);
        let options = SeedOptions {
            users: 20,
            fps: 4,
            deliveries: 40,
        };

        let report = seed(&storage, &options, &mut rng).await.unwrap();
        assert_eq!(report.users, 20);
        assert_eq!(report.dealers + report.beneficiaries, 19);
        assert_eq!(report.fps, 4);

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.user_count, 20);
        assert_eq!(stats.delivery_count as usize, report.deliveries);
        assert_eq!(stats.complaint_count as usize, report.complaints);

        let admins = storage.list_users_by_role(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert!(verify_password(SEED_PASSWORD, &admins[0].password_hash).unwrap());

        assert_eq!(report.metrics.total_deliveries as usize, report.deliveries);
        assert_eq!(report.metrics.disputed_deliveries as usize, report.complaints);
        assert!(storage.get_metrics_snapshot().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_trust_history_ends_at_current_score() {
        let (storage, _temp_db) = storage().await;
        let mut rng = StdRng::seed_from_u64(7);
        let options = SeedOptions {
            users: 10,
            fps: 2,
            deliveries: 5,
        };
        seed(&storage, &options, &mut rng).await.unwrap();

        for user in storage.list_users_by_role(Role::Beneficiary).await.unwrap() {
            let history = storage.trust_history(user.id).await.unwrap();
            assert!((3..=10).contains(&history.len()));
            assert!(user.trust_score >= 40);
            assert_eq!(history[0].new_score, user.trust_score);
            for pair in history.windows(2) {
                assert_eq!(pair[1].new_score, pair[0].old_score);
            }
        }
    }

    #[tokio::test]
    async fn test_reseed_replaces_data() {
        let (storage, _temp_db) = storage().await;
        let mut rng = StdRng::seed_from_u64(3);
        let options = SeedOptions {
            users: 8,
            fps: 2,
            deliveries: 10,
        };
        seed(&storage, &options, &mut rng).await.unwrap();
        seed(&storage, &options, &mut rng).await.unwrap();

        assert_eq!(storage.stats().await.unwrap().user_count, 8);
    }
}
