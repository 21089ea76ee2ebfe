//! Connected-driver registry and offer gating.
//!
//! The registry is the gateway's view of who is reachable right now.
//! Dispatch reads are hot (every offer checks it); session registration and
//! status changes are rare, so a read-write lock fits.

use hail_core::{unix_now, ConnectionStatus, DriverOffer, OfferDecision, OfferResponse};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outcome of attempting to deliver one offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDelivery {
    /// Sent to the driver's session.
    Forwarded,
    /// Driver not connected, not available, or the offer already expired.
    Dropped,
}

struct DriverSession {
    sender: mpsc::UnboundedSender<String>,
    status: ConnectionStatus,
    last_activity: i64,
}

/// Registry of currently connected driver sessions.
#[derive(Default)]
pub struct DriverRegistry {
    sessions: RwLock<HashMap<String, DriverSession>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver connection; returns the outbound message stream for
    /// its socket task. A reconnect replaces the previous session.
    pub fn register(&self, driver_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = DriverSession {
            sender: tx,
            status: ConnectionStatus::Available,
            last_activity: unix_now(),
        };
        self.sessions
            .write()
            .unwrap()
            .insert(driver_id.to_string(), session);
        info!(driver_id, "driver connected");
        rx
    }

    /// Drop a driver's session on disconnect.
    pub fn deregister(&self, driver_id: &str) {
        self.sessions.write().unwrap().remove(driver_id);
        info!(driver_id, "driver disconnected");
    }

    /// Apply a status update from the driver's socket.
    pub fn set_status(&self, driver_id: &str, status: ConnectionStatus) {
        if let Some(session) = self.sessions.write().unwrap().get_mut(driver_id) {
            session.status = status;
            session.last_activity = unix_now();
            debug!(driver_id, ?status, "driver status updated");
        }
    }

    /// Current status, if the driver is connected.
    pub fn status(&self, driver_id: &str) -> Option<ConnectionStatus> {
        self.sessions
            .read()
            .unwrap()
            .get(driver_id)
            .map(|s| s.status)
    }

    /// Number of connected sessions.
    pub fn connected(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Forward one offer to its target driver if the driver is connected,
    /// available, and the offer has not expired.
    pub fn deliver(&self, offer: &DriverOffer) -> OfferDelivery {
        if offer.is_expired(unix_now()) {
            debug!(driver_id = %offer.driver_id, "offer expired before dispatch");
            return OfferDelivery::Dropped;
        }

        let sessions = self.sessions.read().unwrap();
        let Some(session) = sessions.get(&offer.driver_id) else {
            debug!(driver_id = %offer.driver_id, "driver not connected, dropping offer");
            return OfferDelivery::Dropped;
        };
        if session.status != ConnectionStatus::Available {
            debug!(
                driver_id = %offer.driver_id,
                status = ?session.status,
                "driver unavailable, dropping offer"
            );
            return OfferDelivery::Dropped;
        }

        let body = match serde_json::to_string(offer) {
            Ok(body) => body,
            Err(_) => return OfferDelivery::Dropped,
        };
        if session.sender.send(body).is_err() {
            // Socket task already gone; the deregister is racing us.
            return OfferDelivery::Dropped;
        }
        OfferDelivery::Forwarded
    }

    /// Apply a driver's answer: an accept makes the driver busy, a reject
    /// leaves it available.
    pub fn apply_response(&self, response: &OfferResponse) {
        if response.status == OfferDecision::Accept {
            self.set_status(&response.driver_id, ConnectionStatus::Busy);
        }
    }
}
