//! Candidate scoring and ranking.
//!
//! Road-network distance is out of scope; candidates get an approximate
//! distance drawn from a seeded PRNG so that ranking is deterministic for a
//! given (seed, user) pair and tests stay repeatable. The hard contract is
//! the ordering: ascending by distance, accumulation order breaking ties.

use hail_core::MatchedDriver;
use hail_store::DriverRow;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::hash::{Hash, Hasher};

/// Approximate distance bounds, in kilometers.
const MIN_DISTANCE_KM: f64 = 0.5;
const MAX_DISTANCE_KM: f64 = 5.0;

/// Score `candidates` (in accumulation order), sort ascending by distance,
/// and keep the best `k`.
pub fn rank(candidates: Vec<DriverRow>, k: usize, seed: u64, user_id: &str) -> Vec<MatchedDriver> {
    let mut rng = SmallRng::seed_from_u64(seed ^ stable_hash(user_id));

    let mut scored: Vec<MatchedDriver> = candidates
        .into_iter()
        .map(|row| {
            let distance_km =
                MIN_DISTANCE_KM + rng.gen::<f64>() * (MAX_DISTANCE_KM - MIN_DISTANCE_KM);
            let eta_minutes = distance_km.ceil() as u32 + rng.gen_range(1..=3);
            MatchedDriver {
                driver_id: row.driver_id,
                vehicle_type: row.vehicle_type,
                distance_km,
                eta_minutes,
            }
        })
        .collect();

    // Stable sort: equal distances keep accumulation order.
    scored.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    scored.truncate(k);
    scored
}

/// Process-independent hash for per-user score spread.
fn stable_hash(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hail_core::{DriverStatus, DriverUpdate};
    use hail_spatial::CellTriple;

    fn rows(n: usize) -> Vec<DriverRow> {
        (0..n)
            .map(|i| {
                let update = DriverUpdate {
                    driver_id: format!("d{i}"),
                    city: "mumbai".to_string(),
                    latitude: 19.076,
                    longitude: 72.877,
                    timestamp: 1_700_000_000,
                    vehicle_type: "STANDARD".to_string(),
                    status: DriverStatus::Active,
                };
                let cells = CellTriple::for_coords(19.076, 72.877).unwrap();
                DriverRow::new(&update, &cells)
            })
            .collect()
    }

    #[test]
    fn scores_within_bounds_and_sorted() {
        let ranked = rank(rows(10), 5, 42, "user-1");
        assert_eq!(ranked.len(), 5);
        for pair in ranked.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
        for d in &ranked {
            assert!((MIN_DISTANCE_KM..=MAX_DISTANCE_KM).contains(&d.distance_km));
            assert!(d.eta_minutes >= 1);
        }
    }

    #[test]
    fn deterministic_for_same_seed_and_user() {
        let a = rank(rows(8), 5, 7, "user-1");
        let b = rank(rows(8), 5, 7, "user-1");
        let ids_a: Vec<_> = a.iter().map(|d| &d.driver_id).collect();
        let ids_b: Vec<_> = b.iter().map(|d| &d.driver_id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn fewer_candidates_than_k_returns_all() {
        let ranked = rank(rows(3), 5, 0, "u");
        assert_eq!(ranked.len(), 3);
    }
}
