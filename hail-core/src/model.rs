//! Wire and domain records.
//!
//! Ingress messages (`DriverUpdate`, `RideRequest`) arrive as JSON on the
//! per-city topics or the location API and are validated before use. Egress
//! messages (`MatchResult`, `DriverOffer`, `OfferResponse`) are what the
//! realtime layer delivers to users and drivers.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Stored driver availability, embedded in every store key form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriverStatus {
    Active,
    Inactive,
    Busy,
}

impl DriverStatus {
    /// Wire representation, as embedded in store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Active => "ACTIVE",
            DriverStatus::Inactive => "INACTIVE",
            DriverStatus::Busy => "BUSY",
        }
    }

    /// Parse the key-embedded form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(DriverStatus::Active),
            "INACTIVE" => Some(DriverStatus::Inactive),
            "BUSY" => Some(DriverStatus::Busy),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state of a driver connected to the notification gateway.
///
/// Transitions: `Available -> Busy` on an accepted offer, back to
/// `Available` on an explicit status update, `Offline` on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Available,
    Busy,
    Offline,
}

/// A driver location update as published to `<city>-locations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverUpdate {
    pub driver_id: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix seconds; zero means "not set" and is auto-filled at validation.
    #[serde(default)]
    pub timestamp: i64,
    pub vehicle_type: String,
    pub status: DriverStatus,
}

impl DriverUpdate {
    /// Validate the update, filling a zero timestamp from `now`.
    pub fn validate(&mut self, now: i64) -> Result<(), ValidationError> {
        if self.driver_id.is_empty() {
            return Err(ValidationError::MissingField("driver_id"));
        }
        if self.city.is_empty() {
            return Err(ValidationError::MissingField("city"));
        }
        if self.vehicle_type.is_empty() {
            return Err(ValidationError::MissingField("vehicle_type"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::LongitudeOutOfRange);
        }
        if self.timestamp == 0 {
            self.timestamp = now;
        }
        Ok(())
    }
}

/// A passenger ride request as published to `<city>-users`.
///
/// Enriched with a cell triple at matching time; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub user_id: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub request_type: String,
}

impl RideRequest {
    /// Validate the request, filling a zero timestamp from `now`.
    pub fn validate(&mut self, now: i64) -> Result<(), ValidationError> {
        if self.user_id.is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        if self.city.is_empty() {
            return Err(ValidationError::MissingField("city"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::LongitudeOutOfRange);
        }
        if self.timestamp == 0 {
            self.timestamp = now;
        }
        Ok(())
    }

    /// Whether the request is older than `max_age_secs` relative to `now`.
    pub fn is_stale(&self, now: i64, max_age_secs: i64) -> bool {
        now - self.timestamp > max_age_secs
    }
}

/// Outcome status of a match attempt, as delivered to the user.
///
/// `QueryFailed` means the store answered nothing at all; it is distinct
/// from `NoDriversAvailable`, which is a definite empty answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Success,
    NoDriversAvailable,
    QueryFailed,
}

/// A ranked driver entry inside a match result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedDriver {
    pub driver_id: String,
    pub vehicle_type: String,
    pub distance_km: f64,
    pub eta_minutes: u32,
}

/// The ranked candidate set published to `user:<user_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub user_id: String,
    pub request_time: i64,
    pub status: MatchStatus,
    pub drivers: Vec<MatchedDriver>,
}

impl MatchResult {
    /// Build a result from ranked drivers; an empty list means no drivers.
    pub fn new(user_id: String, request_time: i64, drivers: Vec<MatchedDriver>) -> Self {
        let status = if drivers.is_empty() {
            MatchStatus::NoDriversAvailable
        } else {
            MatchStatus::Success
        };
        MatchResult {
            user_id,
            request_time,
            status,
            drivers,
        }
    }

    /// The result delivered when every store query failed.
    pub fn query_failed(user_id: String, request_time: i64) -> Self {
        MatchResult {
            user_id,
            request_time,
            status: MatchStatus::QueryFailed,
            drivers: Vec::new(),
        }
    }
}

/// How long a driver has to answer an offer, in seconds.
pub const OFFER_TTL_SECS: i64 = 30;

/// A ride offer directed at one candidate driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOffer {
    /// Message discriminator on the inter-service socket; always `RIDE_REQUEST`.
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub driver_id: String,
    /// 1-based rank of this driver in the match result.
    pub priority: u32,
    pub pickup_lat: f64,
    pub pickup_long: f64,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub request_time: i64,
    pub expires_at: i64,
}

impl DriverOffer {
    pub const KIND: &'static str = "RIDE_REQUEST";

    /// Build the offer for `driver` at `priority` against a request at
    /// (`pickup_lat`, `pickup_long`) made at `request_time`.
    pub fn new(
        user_id: &str,
        driver: &MatchedDriver,
        priority: u32,
        pickup_lat: f64,
        pickup_long: f64,
        request_time: i64,
    ) -> Self {
        DriverOffer {
            kind: Self::KIND.to_string(),
            user_id: user_id.to_string(),
            driver_id: driver.driver_id.clone(),
            priority,
            pickup_lat,
            pickup_long,
            distance_km: driver.distance_km,
            eta_minutes: driver.eta_minutes,
            request_time,
            expires_at: request_time + OFFER_TTL_SECS,
        }
    }

    /// Whether the offer's response window has closed.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// A driver's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OfferDecision {
    Accept,
    Reject,
}

/// Response echoed back to the matching service over the inter-service socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferResponse {
    /// Message discriminator; always `RIDE_RESPONSE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub driver_id: String,
    pub request_time: i64,
    pub response_time: i64,
    pub status: OfferDecision,
}

impl OfferResponse {
    pub const KIND: &'static str = "RIDE_RESPONSE";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> DriverUpdate {
        DriverUpdate {
            driver_id: "MH-12345678".to_string(),
            city: "mumbai".to_string(),
            latitude: 19.076,
            longitude: 72.877,
            timestamp: 1_647_860_964,
            vehicle_type: "STANDARD".to_string(),
            status: DriverStatus::Active,
        }
    }

    #[test]
    fn valid_update_passes() {
        assert!(update().validate(0).is_ok());
    }

    #[test]
    fn out_of_range_latitude_rejected() {
        let mut u = update();
        u.latitude = 91.0;
        assert_eq!(u.validate(0), Err(ValidationError::LatitudeOutOfRange));
    }

    #[test]
    fn empty_driver_id_rejected() {
        let mut u = update();
        u.driver_id.clear();
        assert_eq!(u.validate(0), Err(ValidationError::MissingField("driver_id")));
    }

    #[test]
    fn zero_timestamp_auto_filled() {
        let mut u = update();
        u.timestamp = 0;
        u.validate(1_700_000_000).unwrap();
        assert_eq!(u.timestamp, 1_700_000_000);
    }

    #[test]
    fn nonzero_timestamp_preserved() {
        let mut u = update();
        u.validate(1_700_000_000).unwrap();
        assert_eq!(u.timestamp, 1_647_860_964);
    }

    #[test]
    fn status_wire_format_roundtrip() {
        let json = serde_json::to_string(&DriverStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
        let back: DriverStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DriverStatus::Active);
        assert_eq!(DriverStatus::parse("BUSY"), Some(DriverStatus::Busy));
        assert_eq!(DriverStatus::parse("busy"), None);
    }

    #[test]
    fn stale_request_detection() {
        let mut req = RideRequest {
            user_id: "u1".to_string(),
            city: "pune".to_string(),
            latitude: 18.52,
            longitude: 73.85,
            timestamp: 1000,
            request_type: "STANDARD".to_string(),
        };
        req.validate(1000).unwrap();
        assert!(!req.is_stale(1300, 300));
        assert!(req.is_stale(1301, 300));
    }

    #[test]
    fn empty_match_result_is_no_drivers() {
        let r = MatchResult::new("u1".to_string(), 42, Vec::new());
        assert_eq!(r.status, MatchStatus::NoDriversAvailable);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "NO_DRIVERS_AVAILABLE");
    }

    #[test]
    fn offer_expiry_window() {
        let driver = MatchedDriver {
            driver_id: "d1".to_string(),
            vehicle_type: "STANDARD".to_string(),
            distance_km: 1.2,
            eta_minutes: 3,
        };
        let offer = DriverOffer::new("u1", &driver, 1, 19.0, 72.0, 1000);
        assert_eq!(offer.expires_at, 1030);
        assert!(!offer.is_expired(1030));
        assert!(offer.is_expired(1031));
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["type"], "RIDE_REQUEST");
    }
}
