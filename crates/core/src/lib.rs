//! Core state for the order-mesh simulator.
//!
//! - [`Peer`]: the per-node state machine (order arrival, storing, purging).
//! - [`Network`]: the peer arena and the only place links are created or removed.
//! - [`OrderBook`]: global order validity.
//! - [`Scenario`], [`Engine`], [`Performance`]: the pluggable policy traits.
//!
//! Nothing in this crate advances time. The round schedule lives in
//! `meshsim-simulation`.

mod error;
mod events;
mod measurement;
mod network;
mod order_book;
mod peer;
mod traits;

pub use error::{InvariantViolation, PolicyError};
pub use events::{ExternalOrder, NewOrder, PeerSpec, RoundEvents};
pub use measurement::{Measurement, Measurements};
pub use network::Network;
pub use order_book::{OrderBook, RetiredCounts};
pub use peer::{Arrival, Peer, StoreOutcome};
pub use traits::{Engine, Performance, Scenario, SimView};
