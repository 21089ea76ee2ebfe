//! Driver location table schema constants.
//!
//! ## Table layout
//!
//! ```text
//! Table: DriverLocations (configurable)
//!
//! Primary key:
//!   - PK (String, HASH):  "H3#9#<r9-prefix>_<driver-suffix>"
//!   - SK (String, RANGE): "DRIVER#<driver_id>#<status>"
//!
//! Global secondary indexes (all attributes projected):
//!   - StatusH3Index:     GSI1PK = "<status>#H3#9#<r9-prefix>", GSI1SK = "TS#<updated_at>"
//!   - StatusH3Res8Index: GSI2PK = "<status>#H3#8#<r8-prefix>"
//!   - StatusH3Res7Index: GSI3PK = "<status>#H3#7#<r7-prefix>"
//!
//! Attributes:
//!   - driver_id, vehicle_type, status: String
//!   - location: String "lat,lng"
//!   - h3_res9, h3_res8, h3_res7: String (full cell indexes)
//!   - updated_at: Number (Unix epoch seconds)
//!   - expires_at: Number (updated_at + 900; per-item TTL attribute)
//! ```
//!
//! The `<r9-prefix>` shards partitions; the full cell strings on the item are
//! the authoritative spatial keys. The `driver-suffix` (last three characters
//! of the driver id) spreads a hot cell across partitions.
//!
//! Status is embedded in every key form, so a status transition writes a new
//! item and leaves the prior one reachable under its old keys until the TTL
//! reaps it; readers filter by status.

/// Primary hash key.
pub const ATTR_PK: &str = "PK";
/// Primary range key.
pub const ATTR_SK: &str = "SK";
/// `StatusH3Index` hash key.
pub const ATTR_GSI1PK: &str = "GSI1PK";
/// `StatusH3Index` range key (time-ordered scans within a prefix).
pub const ATTR_GSI1SK: &str = "GSI1SK";
/// `StatusH3Res8Index` hash key.
pub const ATTR_GSI2PK: &str = "GSI2PK";
/// `StatusH3Res7Index` hash key.
pub const ATTR_GSI3PK: &str = "GSI3PK";

pub const ATTR_DRIVER_ID: &str = "driver_id";
/// Encoded "lat,lng" location string.
pub const ATTR_LOCATION: &str = "location";
pub const ATTR_H3_RES9: &str = "h3_res9";
pub const ATTR_H3_RES8: &str = "h3_res8";
pub const ATTR_H3_RES7: &str = "h3_res7";
pub const ATTR_VEHICLE_TYPE: &str = "vehicle_type";
/// Note: "status" is a DynamoDB reserved word, use ExpressionAttributeNames.
pub const ATTR_STATUS: &str = "status";
pub const ATTR_UPDATED_AT: &str = "updated_at";
pub const ATTR_EXPIRES_AT: &str = "expires_at";

/// Index serving resolution-9 prefix queries.
pub const STATUS_H3_INDEX: &str = "StatusH3Index";
/// Index serving resolution-8 prefix queries.
pub const STATUS_H3_RES8_INDEX: &str = "StatusH3Res8Index";
/// Index serving resolution-7 prefix queries.
pub const STATUS_H3_RES7_INDEX: &str = "StatusH3Res7Index";

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "DriverLocations";

/// Row lifetime: expires_at = updated_at + this.
pub const LOCATION_TTL_SECS: i64 = 900;

/// Cell-prefix length used in shard keys.
pub const CELL_PREFIX_LEN: usize = 5;

/// Driver-suffix length used in the primary hash key.
pub const DRIVER_SUFFIX_LEN: usize = 3;

/// Index name and hash-key attribute serving queries at `res`.
///
/// Returns `None` for resolutions the table does not index.
pub fn index_for_resolution(res: u8) -> Option<(&'static str, &'static str)> {
    match res {
        9 => Some((STATUS_H3_INDEX, ATTR_GSI1PK)),
        8 => Some((STATUS_H3_RES8_INDEX, ATTR_GSI2PK)),
        7 => Some((STATUS_H3_RES7_INDEX, ATTR_GSI3PK)),
        _ => None,
    }
}
