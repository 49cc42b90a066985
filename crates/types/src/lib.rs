//! Core types for the order-mesh simulator.
//!
//! Everything here is plain data: identifiers, orders, the peer-local records
//! peers keep about orders and neighbors, and the protocol parameter sets.
//! Behavior lives in `meshsim-core`.

mod identifiers;
mod neighbor;
mod order;
mod order_info;
mod params;

pub use identifiers::{OrderId, PeerId, PeerKind, Round};
pub use neighbor::Neighbor;
pub use order::{InvalidReason, Order, Validity};
pub use order_info::{OrderInfo, OrderStatus, Provenance};
pub use params::{IncentiveParams, NeighborBounds, ParamError, PruneConfig};
