//! Matching-side offer dispatch client.
//!
//! The matching service does not hold a standing connection to the
//! notification gateway: it dials lazily when the first offers need to go
//! out, keeps the socket cached, and on any failure clears it so the next
//! publication redials. A short cooldown between dial attempts keeps a dead
//! gateway from turning every match into a connect timeout; there is no
//! retry loop.

use crate::error::{RealtimeError, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use hail_core::{DriverOffer, OfferResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Minimum spacing between dial attempts after a failure.
const DIAL_COOLDOWN: Duration = Duration::from_secs(3);

struct DialState {
    writer: Option<WsWriter>,
    /// No dialing before this instant; set after a failed attempt.
    next_attempt: Option<Instant>,
}

struct Inner {
    url: String,
    state: Mutex<DialState>,
}

/// Lazily connected websocket client towards the notification gateway.
#[derive(Clone)]
pub struct OfferDispatcher {
    inner: Arc<Inner>,
}

impl OfferDispatcher {
    /// `url` is the gateway's inter-service endpoint, e.g.
    /// `ws://notifications:9080/ws/matching`.
    pub fn new(url: String) -> Self {
        OfferDispatcher {
            inner: Arc::new(Inner {
                url,
                state: Mutex::new(DialState {
                    writer: None,
                    next_attempt: None,
                }),
            }),
        }
    }

    /// Ship one request's offers as a single JSON array frame.
    ///
    /// [`RealtimeError::NotConnected`] means the offers were dropped for
    /// this request; the caller does not retry, the next request redials.
    pub async fn send_offers(&self, offers: &[DriverOffer]) -> Result<()> {
        if offers.is_empty() {
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        if state.writer.is_none() {
            if let Some(next) = state.next_attempt {
                if Instant::now() < next {
                    debug!("dial cooldown active, dropping offers");
                    return Err(RealtimeError::NotConnected);
                }
            }
            match connect_async(self.inner.url.as_str()).await {
                Ok((stream, _)) => {
                    let (writer, reader) = stream.split();
                    state.writer = Some(writer);
                    state.next_attempt = None;
                    self.spawn_reader(reader);
                    info!(url = %self.inner.url, "connected to notification gateway");
                }
                Err(err) => {
                    state.next_attempt = Some(Instant::now() + DIAL_COOLDOWN);
                    warn!(url = %self.inner.url, error = %err, "gateway dial failed");
                    return Err(RealtimeError::NotConnected);
                }
            }
        }

        let body = serde_json::to_string(offers)?;
        let writer = match state.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(RealtimeError::NotConnected),
        };
        if let Err(err) = writer.send(Message::Text(body)).await {
            warn!(error = %err, "offer send failed, clearing gateway socket");
            state.writer = None;
            state.next_attempt = Some(Instant::now() + DIAL_COOLDOWN);
            return Err(RealtimeError::NotConnected);
        }
        debug!(offers = offers.len(), "offers sent to notification gateway");
        Ok(())
    }

    /// Drain driver responses; when the stream ends, clear the cached
    /// writer so the next publication reconnects.
    fn spawn_reader(&self, mut reader: WsReader) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<OfferResponse>(&text) {
                            Ok(response) => info!(
                                driver_id = %response.driver_id,
                                user_id = %response.user_id,
                                status = ?response.status,
                                "driver response received"
                            ),
                            Err(_) => debug!("unrecognized gateway frame"),
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            inner.state.lock().await.writer = None;
            info!("notification gateway connection closed");
        });
    }
}
