//! Websocket gateways.
//!
//! [`UserGateway`] bridges one pub/sub subscription per connected user
//! socket; [`DriverGateway`] owns the connected-driver registry and the
//! inter-service socket the matching engine ships offers over.

use crate::error::{RealtimeError, Result};
use crate::pubsub::MatchPublisher;
use crate::registry::{DriverRegistry, OfferDelivery};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use hail_core::{ConnectionStatus, DriverOffer, OfferResponse, PipelineMetrics};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bridges `user:<user_id>` pub/sub messages onto user websockets.
pub struct UserGateway {
    client: redis::Client,
}

impl UserGateway {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| RealtimeError::Redis(e.to_string()))?;
        Ok(UserGateway { client })
    }

    /// Pump messages for one user socket until either side closes.
    ///
    /// Exactly one subscription per socket; it is torn down when the socket
    /// closes. A missing `user_id` gets a single error frame and a close.
    pub async fn serve(&self, mut socket: WebSocket, user_id: Option<String>) {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            let _ = socket.send(Message::Text("user_id required".to_string())).await;
            return;
        };

        let channel = MatchPublisher::user_channel(&user_id);
        let mut pubsub = match self.client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "pub/sub connection failed");
                return;
            }
        };
        if let Err(err) = pubsub.subscribe(&channel).await {
            warn!(channel = %channel, error = %err, "subscribe failed");
            return;
        }
        info!(channel = %channel, "user subscribed");

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                message = messages.next() => {
                    let Some(message) = message else { break };
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = %err, "undecodable pub/sub payload");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                frame = socket.recv() => {
                    match frame {
                        // Inbound frames from users are ignored.
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
        info!(channel = %channel, "user socket closed");
    }
}

/// Inbound status update on a driver socket.
#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: ConnectionStatus,
}

/// Driver-side gateway: session registry, offer dispatch, response echo.
pub struct DriverGateway {
    registry: Arc<DriverRegistry>,
    metrics: Arc<PipelineMetrics>,
    /// Sender towards the currently connected matching-service socket.
    matching_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl DriverGateway {
    pub fn new(registry: Arc<DriverRegistry>, metrics: Arc<PipelineMetrics>) -> Self {
        DriverGateway {
            registry,
            metrics,
            matching_tx: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Serve one driver's socket: forward queued offers out, apply inbound
    /// status updates and offer responses. The session is registered as
    /// AVAILABLE on connect and removed on disconnect.
    pub async fn serve_driver(&self, socket: WebSocket, driver_id: String) {
        let mut outbound = self.registry.register(&driver_id);
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                body = outbound.recv() => {
                    let Some(body) = body else { break };
                    if sink.send(Message::Text(body)).await.is_err() {
                        break;
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_driver_frame(&driver_id, &text);
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
        self.registry.deregister(&driver_id);
    }

    /// Apply one inbound frame from a driver socket.
    ///
    /// Frames are either `{"status": ...}` session updates or full
    /// `RIDE_RESPONSE` messages; responses are echoed to the matching
    /// service.
    pub fn handle_driver_frame(&self, driver_id: &str, text: &str) {
        if let Ok(response) = serde_json::from_str::<OfferResponse>(text) {
            if response.kind == OfferResponse::KIND {
                info!(
                    driver_id,
                    user_id = %response.user_id,
                    status = ?response.status,
                    "driver responded to offer"
                );
                self.registry.apply_response(&response);
                self.echo_to_matching(text);
                return;
            }
        }
        match serde_json::from_str::<StatusUpdate>(text) {
            Ok(update) => self.registry.set_status(driver_id, update.status),
            Err(err) => warn!(driver_id, error = %err, "unrecognized driver frame"),
        }
    }

    /// Serve the matching service's socket: inbound frames are JSON arrays
    /// of offers, outbound frames are driver responses.
    pub async fn serve_matching(&self, socket: WebSocket) {
        info!("matching service connected");
        let mut echoes = self.attach_matching();
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                echo = echoes.recv() => {
                    let Some(echo) = echo else { break };
                    if sink.send(Message::Text(echo)).await.is_err() {
                        break;
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch_frame(&text);
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
        self.detach_matching();
        info!("matching service disconnected");
    }

    /// Register the response channel for a newly connected matching socket.
    ///
    /// A new connection replaces the previous one.
    pub fn attach_matching(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.matching_tx.lock().unwrap() = Some(tx);
        rx
    }

    /// Clear the matching socket on disconnect.
    pub fn detach_matching(&self) {
        *self.matching_tx.lock().unwrap() = None;
    }

    /// Decode one offers frame and deliver each offer to its target driver.
    ///
    /// Returns `(forwarded, dropped)` counts.
    pub fn dispatch_frame(&self, text: &str) -> (usize, usize) {
        let offers: Vec<DriverOffer> = match serde_json::from_str(text) {
            Ok(offers) => offers,
            Err(err) => {
                warn!(error = %err, "undecodable offers frame");
                return (0, 0);
            }
        };

        let mut forwarded = 0;
        let mut dropped = 0;
        for offer in &offers {
            match self.registry.deliver(offer) {
                OfferDelivery::Forwarded => {
                    forwarded += 1;
                    PipelineMetrics::incr(&self.metrics.offers_forwarded);
                }
                OfferDelivery::Dropped => {
                    dropped += 1;
                    PipelineMetrics::incr(&self.metrics.offers_dropped);
                }
            }
        }
        debug!(total = offers.len(), forwarded, dropped, "offers dispatched");
        (forwarded, dropped)
    }

    fn echo_to_matching(&self, body: &str) {
        if let Some(tx) = self.matching_tx.lock().unwrap().as_ref() {
            if tx.send(body.to_string()).is_err() {
                debug!("matching socket gone, response echo dropped");
            }
        }
    }
}
