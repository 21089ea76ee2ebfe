//! Realtime delivery fabric.
//!
//! Two logically distinct channels leave the matching engine:
//!
//! - **Match results** go to the requesting user: published on the
//!   `user:<user_id>` pub/sub channel and bridged to the user's websocket by
//!   [`UserGateway`]. No subscriber at publish time means the message is
//!   lost; clients reconnect and retry their request.
//! - **Ride offers** go to candidate drivers: the matching side's
//!   [`OfferDispatcher`] ships them over an inter-service websocket to the
//!   [`DriverGateway`], which forwards each offer only to a driver that is
//!   currently connected and available.

pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod pubsub;
pub mod registry;

pub use dispatcher::OfferDispatcher;
pub use error::{RealtimeError, Result};
pub use gateway::{DriverGateway, UserGateway};
pub use pubsub::{MatchPublisher, RedisConfig, USER_UPDATES_CHANNEL};
pub use registry::{DriverRegistry, OfferDelivery};
