//! Driver location rows and composite key derivation.
//!
//! The key layout *is* the query plan: the widening search in the matching
//! engine queries exactly the `<status>#H3#<res>#<prefix>` hash keys derived
//! here, so derivation and querying must agree byte for byte.

use crate::error::{Result, StoreError};
use crate::schema::{CELL_PREFIX_LEN, DRIVER_SUFFIX_LEN, LOCATION_TTL_SECS};
use hail_core::{DriverStatus, DriverUpdate};
use hail_spatial::{shard_prefix, CellTriple};

/// A fully keyed driver location row.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRow {
    pub pk: String,
    pub sk: String,
    pub gsi1pk: String,
    pub gsi1sk: String,
    pub gsi2pk: String,
    pub gsi3pk: String,
    pub driver_id: String,
    /// Encoded "lat,lng".
    pub location: String,
    pub h3_res9: String,
    pub h3_res8: String,
    pub h3_res7: String,
    pub vehicle_type: String,
    pub status: DriverStatus,
    pub updated_at: i64,
    pub expires_at: i64,
}

impl DriverRow {
    /// Build the row for a validated update and its derived cell triple.
    ///
    /// `updated_at` comes from the update's (auto-filled) timestamp so that
    /// replays of the same message produce byte-identical rows.
    pub fn new(update: &DriverUpdate, cells: &CellTriple) -> Self {
        let status = update.status;
        let updated_at = update.timestamp;
        let r9_prefix = shard_prefix(&cells.r9, CELL_PREFIX_LEN);
        let r8_prefix = shard_prefix(&cells.r8, CELL_PREFIX_LEN);
        let r7_prefix = shard_prefix(&cells.r7, CELL_PREFIX_LEN);

        DriverRow {
            pk: format!("H3#9#{}_{}", r9_prefix, driver_suffix(&update.driver_id)),
            sk: format!("DRIVER#{}#{}", update.driver_id, status),
            gsi1pk: status_cell_key(status, 9, &r9_prefix),
            gsi1sk: format!("TS#{}", updated_at),
            gsi2pk: status_cell_key(status, 8, &r8_prefix),
            gsi3pk: status_cell_key(status, 7, &r7_prefix),
            driver_id: update.driver_id.clone(),
            location: format!("{},{}", update.latitude, update.longitude),
            h3_res9: cells.r9.clone(),
            h3_res8: cells.r8.clone(),
            h3_res7: cells.r7.clone(),
            vehicle_type: update.vehicle_type.clone(),
            status,
            updated_at,
            expires_at: updated_at + LOCATION_TTL_SECS,
        }
    }

    /// Decode the "lat,lng" location string.
    pub fn coordinates(&self) -> Result<(f64, f64)> {
        let (lat, lng) = self
            .location
            .split_once(',')
            .ok_or_else(|| StoreError::InvalidRow(format!("bad location: {}", self.location)))?;
        let lat: f64 = lat
            .parse()
            .map_err(|_| StoreError::InvalidRow(format!("bad latitude: {lat}")))?;
        let lng: f64 = lng
            .parse()
            .map_err(|_| StoreError::InvalidRow(format!("bad longitude: {lng}")))?;
        Ok((lat, lng))
    }
}

/// Last three characters of the driver id, left-padded with `'0'` when the
/// id is shorter.
pub fn driver_suffix(driver_id: &str) -> String {
    if driver_id.len() >= DRIVER_SUFFIX_LEN {
        driver_id[driver_id.len() - DRIVER_SUFFIX_LEN..].to_string()
    } else {
        let mut suffix = driver_id.to_string();
        suffix.extend(std::iter::repeat('0').take(DRIVER_SUFFIX_LEN - driver_id.len()));
        suffix
    }
}

/// Hash key of the status-scoped index at `res`: `<status>#H3#<res>#<prefix>`.
pub fn status_cell_key(status: DriverStatus, res: u8, prefix: &str) -> String {
    format!("{}#H3#{}#{}", status, res, prefix)
}

/// Parse a sort key `DRIVER#<driver_id>#<status>` back into its parts.
pub fn parse_sort_key(sk: &str) -> Result<(String, DriverStatus)> {
    let rest = sk
        .strip_prefix("DRIVER#")
        .ok_or_else(|| StoreError::InvalidRow(format!("bad sort key: {sk}")))?;
    let (driver_id, status) = rest
        .rsplit_once('#')
        .ok_or_else(|| StoreError::InvalidRow(format!("bad sort key: {sk}")))?;
    let status = DriverStatus::parse(status)
        .ok_or_else(|| StoreError::InvalidRow(format!("bad status in sort key: {sk}")))?;
    Ok((driver_id.to_string(), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mumbai_update(driver_id: &str, status: DriverStatus) -> (DriverUpdate, CellTriple) {
        let update = DriverUpdate {
            driver_id: driver_id.to_string(),
            city: "mumbai".to_string(),
            latitude: 19.076,
            longitude: 72.877,
            timestamp: 1_647_860_964,
            vehicle_type: "STANDARD".to_string(),
            status,
        };
        let cells = CellTriple::for_coords(update.latitude, update.longitude).unwrap();
        (update, cells)
    }

    #[test]
    fn happy_path_keys() {
        let (update, cells) = mumbai_update("MH-12345678", DriverStatus::Active);
        let row = DriverRow::new(&update, &cells);

        let r9_prefix = shard_prefix(&cells.r9, 5);
        assert_eq!(row.pk, format!("H3#9#{}_678", r9_prefix));
        assert_eq!(row.sk, "DRIVER#MH-12345678#ACTIVE");
        assert_eq!(row.gsi1pk, format!("ACTIVE#H3#9#{}", r9_prefix));
        assert_eq!(row.gsi1sk, "TS#1647860964");
        assert_eq!(row.expires_at, 1_647_861_864);
    }

    #[test]
    fn keys_parse_back() {
        let (update, cells) = mumbai_update("MH-12345678", DriverStatus::Busy);
        let row = DriverRow::new(&update, &cells);

        let (driver_id, status) = parse_sort_key(&row.sk).unwrap();
        assert_eq!(driver_id, "MH-12345678");
        assert_eq!(status, DriverStatus::Busy);

        // All four key forms embed the same status and cell data.
        assert!(row.gsi1pk.starts_with("BUSY#H3#9#"));
        assert!(row.gsi2pk.starts_with("BUSY#H3#8#"));
        assert!(row.gsi3pk.starts_with("BUSY#H3#7#"));
        assert_eq!(&row.gsi1pk[10..], shard_prefix(&row.h3_res9, 5));
        assert_eq!(&row.gsi2pk[10..], shard_prefix(&row.h3_res8, 5));
        assert_eq!(&row.gsi3pk[10..], shard_prefix(&row.h3_res7, 5));
    }

    #[test]
    fn short_driver_id_padded() {
        let (update, cells) = mumbai_update("AB", DriverStatus::Active);
        let row = DriverRow::new(&update, &cells);
        assert!(row.pk.ends_with("_AB0"));
        assert_eq!(driver_suffix("AB"), "AB0");
        assert_eq!(driver_suffix(""), "000");
        assert_eq!(driver_suffix("MH-12345678"), "678");
    }

    #[test]
    fn location_string_roundtrip() {
        let (update, cells) = mumbai_update("d1", DriverStatus::Active);
        let row = DriverRow::new(&update, &cells);
        let (lat, lng) = row.coordinates().unwrap();
        assert!((lat - 19.076).abs() < 1e-9);
        assert!((lng - 72.877).abs() < 1e-9);
    }

    #[test]
    fn bad_sort_keys_rejected() {
        assert!(parse_sort_key("RIDER#x#ACTIVE").is_err());
        assert!(parse_sort_key("DRIVER#only-id").is_err());
        assert!(parse_sort_key("DRIVER#d1#NAPPING").is_err());
    }
}
