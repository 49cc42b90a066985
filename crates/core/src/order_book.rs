//! Global order book.
//!
//! The order book is the single ground truth for order validity. Peers only
//! hold ids; whether an id still refers to a live order is always answered
//! here.

use crate::PolicyError;
use indexmap::IndexMap;
use meshsim_types::{InvalidReason, Order, OrderId, PeerId, Round, Validity};
use tracing::trace;

/// Number of orders retired per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetiredCounts {
    pub cancelled: u64,
    pub expired: u64,
    pub settled: u64,
    pub orphaned: u64,
}

impl RetiredCounts {
    fn record(&mut self, reason: InvalidReason) {
        match reason {
            InvalidReason::Cancelled => self.cancelled += 1,
            InvalidReason::Expired => self.expired += 1,
            InvalidReason::Settled => self.settled += 1,
            InvalidReason::Orphaned => self.orphaned += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.cancelled + self.expired + self.settled + self.orphaned
    }
}

/// Every order currently known to the mesh.
///
/// Invalidation is two-step: an order is first marked invalid, every peer
/// purges it, and only then is it retired from the book. Between the two
/// steps the order is still known but no longer valid.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: IndexMap<OrderId, Order>,
    marked: IndexMap<OrderId, InvalidReason>,
    next_id: u64,
    retired: RetiredCounts,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new order and return its id.
    pub fn create(&mut self, birth: Round, creator: PeerId, expiration: u64) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        self.orders
            .insert(id, Order::new(id, birth, creator, expiration));
        trace!(order = %id, creator = %creator, expiration, "Order created");
        id
    }

    /// Look up an order.
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Look up an order, failing if the id is unknown.
    pub fn order(&self, id: OrderId) -> Result<&Order, PolicyError> {
        self.orders.get(&id).ok_or(PolicyError::UnknownOrder(id))
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Whether `id` refers to a known order that has not been invalidated.
    pub fn is_valid(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id) && !self.marked.contains_key(&id)
    }

    /// Validity of a known order.
    pub fn validity(&self, id: OrderId) -> Option<Validity> {
        if !self.orders.contains_key(&id) {
            return None;
        }
        Some(match self.marked.get(&id) {
            Some(reason) => Validity::Invalid(*reason),
            None => Validity::Valid,
        })
    }

    /// Mark an order invalid.
    ///
    /// Returns `false` if the order was already marked; the first reason wins.
    pub fn invalidate(&mut self, id: OrderId, reason: InvalidReason) -> Result<bool, PolicyError> {
        if !self.orders.contains_key(&id) {
            return Err(PolicyError::UnknownOrder(id));
        }
        if self.marked.contains_key(&id) {
            return Ok(false);
        }
        self.marked.insert(id, reason);
        Ok(true)
    }

    /// Orders marked invalid but not yet retired.
    pub fn marked(&self) -> impl Iterator<Item = (OrderId, InvalidReason)> + '_ {
        self.marked.iter().map(|(id, reason)| (*id, *reason))
    }

    /// Remove every marked order from the book.
    pub fn retire_marked(&mut self) -> Vec<(OrderId, InvalidReason)> {
        let retired: Vec<_> = self.marked.drain(..).collect();
        for (id, reason) in &retired {
            self.orders.shift_remove(id);
            self.retired.record(*reason);
        }
        retired
    }

    /// Valid orders in creation order.
    pub fn valid_orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders
            .values()
            .filter(|order| !self.marked.contains_key(&order.id))
    }

    /// Ids of valid orders in creation order.
    pub fn valid_ids(&self) -> Vec<OrderId> {
        self.valid_orders().map(|order| order.id).collect()
    }

    /// Number of known orders, marked ones included.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Total number of orders ever created.
    pub fn created(&self) -> u64 {
        self.next_id
    }

    pub fn retired(&self) -> RetiredCounts {
        self.retired
    }
}
