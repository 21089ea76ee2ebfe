//! The widening search.

use crate::error::{MatchError, Result};
use crate::score;
use hail_core::{DriverOffer, DriverStatus, MatchResult, MatchStatus, RideRequest};
use hail_spatial::{neighbors, shard_prefix, CellTriple};
use hail_store::schema::CELL_PREFIX_LEN;
use hail_store::{DriverRow, LocationStore};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Matching parameters.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Target candidate count K; the search stops once this many accumulate.
    pub min_drivers: usize,
    /// Advisory distance ceiling in kilometers.
    pub max_distance_km: f64,
    /// Scoring seed; per-request user-id mix-in spreads it.
    pub score_seed: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            min_drivers: 5,
            max_distance_km: 10.0,
            score_seed: 0,
        }
    }
}

/// A match result together with the offers derived from it.
#[derive(Debug)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub offers: Vec<DriverOffer>,
}

/// One step of the widening search: every prefix is queried at `res`.
struct SearchStep {
    res: u8,
    prefixes: Vec<String>,
}

/// Driver matching engine over a [`LocationStore`].
pub struct MatchEngine {
    store: Arc<dyn LocationStore>,
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn LocationStore>, config: MatchConfig) -> Self {
        MatchEngine { store, config }
    }

    /// Run the full pipeline for one request: enrich, search, rank, and
    /// build the offers for the winning drivers.
    pub async fn process(&self, request: &RideRequest) -> Result<MatchOutcome> {
        let cells = CellTriple::for_coords(request.latitude, request.longitude)?;
        debug!(user_id = %request.user_id, r9 = %cells.r9, "matching request");

        let candidates = self.find_candidates(&cells).await?;
        let ranked = score::rank(
            candidates,
            self.config.min_drivers,
            self.config.score_seed,
            &request.user_id,
        );

        let result = MatchResult::new(request.user_id.clone(), request.timestamp, ranked);
        let offers = if result.status == MatchStatus::Success {
            result
                .drivers
                .iter()
                .enumerate()
                .map(|(i, driver)| {
                    DriverOffer::new(
                        &request.user_id,
                        driver,
                        i as u32 + 1,
                        request.latitude,
                        request.longitude,
                        request.timestamp,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(MatchOutcome { result, offers })
    }

    /// Escalate through the six search steps until at least `min_drivers`
    /// distinct candidates accumulate, or the steps are exhausted.
    async fn find_candidates(&self, cells: &CellTriple) -> Result<Vec<DriverRow>> {
        let steps = Self::plan(cells)?;

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut candidates: Vec<DriverRow> = Vec::new();
        let mut cells_succeeded = 0usize;
        let mut cells_failed = 0usize;

        for (i, step) in steps.iter().enumerate() {
            let scan = self
                .store
                .query_cells(step.res, &step.prefixes, DriverStatus::Active)
                .await;

            cells_succeeded += step.prefixes.len() - scan.failures.len();
            cells_failed += scan.failures.len();
            for (prefix, err) in &scan.failures {
                warn!(res = step.res, prefix = %prefix, error = %err, "cell query failed");
            }

            for row in scan.rows {
                if seen.insert(row.driver_id.clone()) {
                    candidates.push(row);
                }
            }
            debug!(
                step = i + 1,
                res = step.res,
                accumulated = candidates.len(),
                "widening search step done"
            );

            if candidates.len() >= self.config.min_drivers {
                return Ok(candidates);
            }
        }

        if cells_succeeded == 0 && cells_failed > 0 {
            return Err(MatchError::QueryFailed {
                failed_cells: cells_failed,
            });
        }

        // Whatever accumulated, even if fewer than the target.
        Ok(candidates)
    }

    /// The six-step escalation plan: exact cell then ring, finest resolution
    /// first. Ring steps carry one prefix per neighboring cell.
    fn plan(cells: &CellTriple) -> Result<Vec<SearchStep>> {
        let prefix = |cell: &str| shard_prefix(cell, CELL_PREFIX_LEN);
        let ring_prefixes = |cell: &str| -> Result<Vec<String>> {
            Ok(neighbors(cell)?.iter().map(|c| prefix(c)).collect())
        };

        Ok(vec![
            SearchStep {
                res: 9,
                prefixes: vec![prefix(&cells.r9)],
            },
            SearchStep {
                res: 9,
                prefixes: ring_prefixes(&cells.r9)?,
            },
            SearchStep {
                res: 8,
                prefixes: vec![prefix(&cells.r8)],
            },
            SearchStep {
                res: 8,
                prefixes: ring_prefixes(&cells.r8)?,
            },
            SearchStep {
                res: 7,
                prefixes: vec![prefix(&cells.r7)],
            },
            SearchStep {
                res: 7,
                prefixes: ring_prefixes(&cells.r7)?,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hail_core::unix_now;
    use hail_store::{status_cell_key, MemoryStore};

    const REQUEST_COORDS: (f64, f64) = (19.076, 72.877);

    fn request() -> RideRequest {
        RideRequest {
            user_id: "user-1".to_string(),
            city: "mumbai".to_string(),
            latitude: REQUEST_COORDS.0,
            longitude: REQUEST_COORDS.1,
            timestamp: 1_700_000_000,
            request_type: "STANDARD".to_string(),
        }
    }

    /// A row visible only under the given per-resolution GSI hash keys;
    /// unset resolutions point at a prefix the engine never queries.
    async fn plant(
        store: &MemoryStore,
        driver_id: &str,
        status: DriverStatus,
        key9: Option<String>,
        key8: Option<String>,
        key7: Option<String>,
    ) {
        let unreachable = |res: u8| status_cell_key(status, res, "zzzzz");
        let now = unix_now();
        let row = DriverRow {
            pk: format!("H3#9#zzzzz_{}", &driver_id[driver_id.len().saturating_sub(3)..]),
            sk: format!("DRIVER#{driver_id}#{status}"),
            gsi1pk: key9.unwrap_or_else(|| unreachable(9)),
            gsi1sk: format!("TS#{now}"),
            gsi2pk: key8.unwrap_or_else(|| unreachable(8)),
            gsi3pk: key7.unwrap_or_else(|| unreachable(7)),
            driver_id: driver_id.to_string(),
            location: "19.076,72.877".to_string(),
            h3_res9: String::new(),
            h3_res8: String::new(),
            h3_res7: String::new(),
            vehicle_type: "STANDARD".to_string(),
            status,
            updated_at: now,
            expires_at: now + 900,
        };
        store.upsert(&row).await.unwrap();
    }

    fn triple() -> CellTriple {
        CellTriple::for_coords(REQUEST_COORDS.0, REQUEST_COORDS.1).unwrap()
    }

    fn exact_key(cells: &CellTriple, res: u8) -> String {
        let cell = cells.at(res).unwrap();
        status_cell_key(
            DriverStatus::Active,
            res,
            &shard_prefix(cell, CELL_PREFIX_LEN),
        )
    }

    fn engine(store: &Arc<MemoryStore>, min_drivers: usize) -> MatchEngine {
        MatchEngine::new(
            store.clone(),
            MatchConfig {
                min_drivers,
                score_seed: 42,
                ..MatchConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn exact_cell_satisfies_k_with_single_query() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();
        for i in 0..7 {
            plant(
                &store,
                &format!("d{i}"),
                DriverStatus::Active,
                Some(exact_key(&cells, 9)),
                None,
                None,
            ).await;
        }

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(store.queries_issued(), 1);
        assert_eq!(outcome.result.status, MatchStatus::Success);
        assert_eq!(outcome.result.drivers.len(), 5);
        for pair in outcome.result.drivers.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
        for d in &outcome.result.drivers {
            assert!((0.5..=5.0).contains(&d.distance_km));
        }
    }

    #[tokio::test]
    async fn inactive_drivers_never_match() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();
        plant(
            &store,
            "sleeper",
            DriverStatus::Inactive,
            Some(status_cell_key(
                DriverStatus::Inactive,
                9,
                &shard_prefix(&cells.r9, CELL_PREFIX_LEN),
            )),
            None,
            None,
        ).await;

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(outcome.result.status, MatchStatus::NoDriversAvailable);
        assert!(outcome.result.drivers.is_empty());
        assert!(outcome.offers.is_empty());
    }

    #[tokio::test]
    async fn empty_store_walks_all_six_steps() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(outcome.result.status, MatchStatus::NoDriversAvailable);

        // 1 exact + ring at each of the three resolutions.
        let expected = 3
            + neighbors(&cells.r9).unwrap().len() as u64
            + neighbors(&cells.r8).unwrap().len() as u64
            + neighbors(&cells.r7).unwrap().len() as u64;
        assert_eq!(store.queries_issued(), expected);
    }

    #[tokio::test]
    async fn ancestor_climb_stops_at_satisfying_step() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();

        // Nothing at resolution 9; enough once resolution 8 is reached.
        for i in 0..5 {
            plant(
                &store,
                &format!("r8-{i}"),
                DriverStatus::Active,
                None,
                Some(exact_key(&cells, 8)),
                None,
            ).await;
        }

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(outcome.result.drivers.len(), 5);

        // Steps 1-3 ran; steps 4-6 did not.
        let expected = 1 + neighbors(&cells.r9).unwrap().len() as u64 + 1;
        assert_eq!(store.queries_issued(), expected);
    }

    #[tokio::test]
    async fn escalation_unions_and_dedups_across_steps() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();

        // 2 at the R8 exact step, 1 at the R7 exact step (3 total through
        // step 5), then 7 more only in the R7 ring.
        plant(&store, "a1", DriverStatus::Active, None, Some(exact_key(&cells, 8)), None).await;
        plant(&store, "a2", DriverStatus::Active, None, Some(exact_key(&cells, 8)), None).await;
        plant(&store, "a3", DriverStatus::Active, None, None, Some(exact_key(&cells, 7))).await;

        let ring7 = ring_key_outside_exact(&cells);
        for i in 0..7 {
            plant(
                &store,
                &format!("ring-{i}"),
                DriverStatus::Active,
                None,
                None,
                Some(ring7.clone()),
            ).await;
        }
        // One driver reachable both at R8 exact and in the R7 ring; it must
        // appear once.
        plant(
            &store,
            "a1",
            DriverStatus::Active,
            None,
            Some(exact_key(&cells, 8)),
            Some(ring7),
        ).await;

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(outcome.result.drivers.len(), 5);

        let mut ids: Vec<&str> = outcome
            .result
            .drivers
            .iter()
            .map(|d| d.driver_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5, "duplicate driver in result");
    }

    /// An ACTIVE GSI key belonging to the request's resolution-7 ring but
    /// not to its exact cell. Falls back to a synthetic prefix when every
    /// ring neighbor shares the exact cell's shard prefix (prefixes are a
    /// sharding device, so the store treats any prefix value uniformly).
    fn ring_key_outside_exact(cells: &CellTriple) -> String {
        let exact = shard_prefix(&cells.r7, CELL_PREFIX_LEN);
        neighbors(&cells.r7)
            .unwrap()
            .iter()
            .map(|c| shard_prefix(c, CELL_PREFIX_LEN))
            .find(|p| *p != exact)
            .map(|p| status_cell_key(DriverStatus::Active, 7, &p))
            .unwrap_or_else(|| status_cell_key(DriverStatus::Active, 7, &exact))
    }

    #[tokio::test]
    async fn partial_query_failure_still_matches() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();

        store.fail_queries_for(&exact_key(&cells, 9));
        for i in 0..5 {
            plant(
                &store,
                &format!("d{i}"),
                DriverStatus::Active,
                None,
                Some(exact_key(&cells, 8)),
                None,
            ).await;
        }

        let outcome = engine(&store, 5).process(&request()).await.unwrap();
        assert_eq!(outcome.result.drivers.len(), 5);
    }

    #[tokio::test]
    async fn total_query_failure_is_not_no_drivers() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();

        // Fail every key the engine can query.
        store.fail_queries_for(&exact_key(&cells, 9));
        store.fail_queries_for(&exact_key(&cells, 8));
        store.fail_queries_for(&exact_key(&cells, 7));
        for (res, cell) in [(9u8, &cells.r9), (8, &cells.r8), (7, &cells.r7)] {
            for neighbor in neighbors(cell).unwrap() {
                store.fail_queries_for(&status_cell_key(
                    DriverStatus::Active,
                    res,
                    &shard_prefix(&neighbor, CELL_PREFIX_LEN),
                ));
            }
        }

        let err = engine(&store, 5).process(&request()).await.unwrap_err();
        assert!(matches!(err, MatchError::QueryFailed { .. }));
    }

    #[tokio::test]
    async fn offers_carry_rank_and_expiry() {
        let store = Arc::new(MemoryStore::new());
        let cells = triple();
        for i in 0..3 {
            plant(
                &store,
                &format!("d{i}"),
                DriverStatus::Active,
                Some(exact_key(&cells, 9)),
                None,
                None,
            ).await;
        }

        let req = request();
        let outcome = engine(&store, 5).process(&req).await.unwrap();
        assert_eq!(outcome.result.drivers.len(), 3);
        assert_eq!(outcome.offers.len(), 3);
        for (i, offer) in outcome.offers.iter().enumerate() {
            assert_eq!(offer.priority, i as u32 + 1);
            assert_eq!(offer.request_time, req.timestamp);
            assert_eq!(offer.expires_at, req.timestamp + 30);
            assert_eq!(offer.driver_id, outcome.result.drivers[i].driver_id);
            assert_eq!(offer.pickup_lat, req.latitude);
        }
    }

    #[tokio::test]
    async fn invalid_coordinates_surface_spatial_error() {
        let store = Arc::new(MemoryStore::new());
        let mut req = request();
        req.latitude = 95.0;
        let err = engine(&store, 5).process(&req).await.unwrap_err();
        assert!(matches!(err, MatchError::Spatial(_)));
    }
}
