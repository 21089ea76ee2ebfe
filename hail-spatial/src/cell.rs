//! Cell triple derivation, ring enumeration, and shard prefixes.

use crate::error::{Result, SpatialError};
use h3o::{CellIndex, LatLng, Resolution};

/// Indexing resolutions, finest first.
pub const RESOLUTIONS: [Resolution; 3] = [Resolution::Nine, Resolution::Eight, Resolution::Seven];

/// The three nested cell indexes derived for one coordinate pair.
///
/// String-encoded H3 indexes (lowercase hex). The resolution-9 cell is
/// contained in the resolution-8 cell, which is contained in the
/// resolution-7 cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTriple {
    pub r9: String,
    pub r8: String,
    pub r7: String,
}

impl CellTriple {
    /// Derive the cell triple for a coordinate pair.
    ///
    /// Fails with [`SpatialError::InvalidCoordinates`] when lat/lng are out
    /// of range; callers reject the message rather than crash. The range
    /// check is explicit because the cell library wraps out-of-range
    /// coordinates instead of refusing them.
    pub fn for_coords(lat: f64, lng: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(SpatialError::InvalidCoordinates { lat, lng });
        }
        let latlng =
            LatLng::new(lat, lng).map_err(|_| SpatialError::InvalidCoordinates { lat, lng })?;
        Ok(CellTriple {
            r9: latlng.to_cell(Resolution::Nine).to_string(),
            r8: latlng.to_cell(Resolution::Eight).to_string(),
            r7: latlng.to_cell(Resolution::Seven).to_string(),
        })
    }

    /// The cell at a given resolution, or `None` for a resolution we do not
    /// index.
    pub fn at(&self, res: u8) -> Option<&str> {
        match res {
            9 => Some(&self.r9),
            8 => Some(&self.r8),
            7 => Some(&self.r7),
            _ => None,
        }
    }
}

/// First `n` characters of a cell string, right-padded with `'0'` when the
/// cell is shorter.
///
/// Sharding only: the result partitions hot areas across store partitions
/// and is never used for geometric decisions.
pub fn shard_prefix(cell: &str, n: usize) -> String {
    if cell.len() >= n {
        cell[..n].to_string()
    } else {
        let mut padded = cell.to_string();
        padded.extend(std::iter::repeat('0').take(n - cell.len()));
        padded
    }
}

/// The k=1 ring around `cell`, excluding `cell` itself.
///
/// Six cells for interior cells, fewer around pentagons.
pub fn neighbors(cell: &str) -> Result<Vec<String>> {
    let index: CellIndex = cell
        .parse()
        .map_err(|_| SpatialError::InvalidCell(cell.to_string()))?;
    let ring: Vec<CellIndex> = index.grid_disk(1);
    Ok(ring
        .into_iter()
        .filter(|c| *c != index)
        .map(|c| c.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUMBAI: (f64, f64) = (19.076, 72.877);

    #[test]
    fn triple_resolutions_encode_in_prefix() {
        let triple = CellTriple::for_coords(MUMBAI.0, MUMBAI.1).unwrap();
        // H3 string indexes carry the resolution in their first two chars.
        assert!(triple.r9.starts_with("89"));
        assert!(triple.r8.starts_with("88"));
        assert!(triple.r7.starts_with("87"));
        assert_eq!(triple.at(9), Some(triple.r9.as_str()));
        assert_eq!(triple.at(6), None);
    }

    #[test]
    fn triple_is_nested() {
        let triple = CellTriple::for_coords(MUMBAI.0, MUMBAI.1).unwrap();
        let r9: CellIndex = triple.r9.parse().unwrap();
        let r8: CellIndex = triple.r8.parse().unwrap();
        let r7: CellIndex = triple.r7.parse().unwrap();
        assert_eq!(r9.parent(Resolution::Eight), Some(r8));
        assert_eq!(r8.parent(Resolution::Seven), Some(r7));
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        assert!(matches!(
            CellTriple::for_coords(91.0, 72.877),
            Err(SpatialError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            CellTriple::for_coords(19.076, 181.0),
            Err(SpatialError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn interior_cell_has_six_neighbors() {
        let triple = CellTriple::for_coords(MUMBAI.0, MUMBAI.1).unwrap();
        let ring = neighbors(&triple.r9).unwrap();
        assert_eq!(ring.len(), 6);
        assert!(!ring.contains(&triple.r9));
    }

    #[test]
    fn neighbors_rejects_garbage() {
        assert!(matches!(
            neighbors("not-a-cell"),
            Err(SpatialError::InvalidCell(_))
        ));
    }

    #[test]
    fn shard_prefix_truncates_and_pads() {
        assert_eq!(shard_prefix("891fb46622fffff", 5), "891fb");
        assert_eq!(shard_prefix("89", 5), "89000");
        assert_eq!(shard_prefix("", 5), "00000");
    }
}
