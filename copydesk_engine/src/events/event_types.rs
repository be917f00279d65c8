use serde::{Deserialize, Serialize};

use crate::db_types::{Message, Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when a payment confirmation moves an order out of `pending_payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted for every successful stage transition, including the ones covered by more specific events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAdvancedEvent {
    pub order: Order,
    pub from: OrderStatusType,
    pub to: OrderStatusType,
}

impl StageAdvancedEvent {
    pub fn new(order: Order, from: OrderStatusType, to: OrderStatusType) -> Self {
        Self { order, from, to }
    }
}

/// Emitted when an order is cancelled, either by an admin or by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePostedEvent {
    pub message: Message,
}

impl MessagePostedEvent {
    pub fn new(message: Message) -> Self {
        Self { message }
    }
}
