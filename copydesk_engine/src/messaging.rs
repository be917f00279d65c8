//! Per-order message fan-out.
//!
//! [`MessageFeed`] is the realtime seam of the messaging channel: every message appended to an order is
//! published to all live subscriptions for that order, in insertion order. Delivery is at-least-once from
//! the consumer's point of view — a consumer that also performs an initial full fetch must deduplicate by
//! message id, since a message may land both in the fetch result and on the feed.
//!
//! Cancellation is synchronous: once [`MessageSubscription::cancel`] returns, the subscription's sender has
//! been removed from the registry and no further message will be delivered.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::*;
use tokio::sync::mpsc;

use crate::db_types::{Message, OrderId};

#[derive(Clone, Default)]
pub struct MessageFeed {
    inner: Arc<Mutex<FeedInner>>,
}

#[derive(Default)]
struct FeedInner {
    next_token: u64,
    // order_id -> live subscriber senders
    subscribers: HashMap<String, Vec<(u64, mpsc::UnboundedSender<Message>)>>,
}

impl MessageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription for `order_id`. Messages published after this call are delivered in
    /// per-order FIFO order.
    pub fn subscribe(&self, order_id: &OrderId) -> MessageSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("message feed lock poisoned");
        let token = inner.next_token;
        inner.next_token += 1;
        inner.subscribers.entry(order_id.as_str().to_string()).or_default().push((token, tx));
        trace!("📨️ Subscription {token} registered for order {order_id}");
        MessageSubscription { order_id: order_id.clone(), token, feed: Arc::clone(&self.inner), receiver: rx }
    }

    /// Publishes `message` to every live subscription on its order. Subscribers whose receiving half has
    /// gone away are pruned on the spot.
    pub fn publish(&self, message: &Message) {
        let mut inner = self.inner.lock().expect("message feed lock poisoned");
        let key = message.order_id.as_str();
        let Some(subs) = inner.subscribers.get_mut(key) else {
            return;
        };
        subs.retain(|(token, tx)| match tx.send(message.clone()) {
            Ok(()) => true,
            Err(_) => {
                trace!("📨️ Dropping dead subscription {token} for order {key}");
                false
            },
        });
        if subs.is_empty() {
            inner.subscribers.remove(key);
        }
    }

    /// The number of live subscriptions for an order. Mostly useful in tests.
    pub fn subscriber_count(&self, order_id: &OrderId) -> usize {
        let inner = self.inner.lock().expect("message feed lock poisoned");
        inner.subscribers.get(order_id.as_str()).map(Vec::len).unwrap_or(0)
    }
}

pub struct MessageSubscription {
    order_id: OrderId,
    token: u64,
    feed: Arc<Mutex<FeedInner>>,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl MessageSubscription {
    /// Awaits the next message on this order. Returns `None` after cancellation has drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Deregisters the subscription. Synchronous: after this returns, no further message is delivered.
    pub fn cancel(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        let mut inner = self.feed.lock().expect("message feed lock poisoned");
        if let Some(subs) = inner.subscribers.get_mut(self.order_id.as_str()) {
            subs.retain(|(token, _)| *token != self.token);
            if subs.is_empty() {
                inner.subscribers.remove(self.order_id.as_str());
            }
        }
        // Drain anything already buffered so a racing publisher cannot be observed after cancel.
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn message(order: &OrderId, id: i64, body: &str) -> Message {
        Message {
            id,
            order_id: order.clone(),
            sender_id: "user-1".into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let feed = MessageFeed::new();
        let oid = OrderId("ord-00000000feed".into());
        let mut sub = feed.subscribe(&oid);
        feed.publish(&message(&oid, 1, "A"));
        feed.publish(&message(&oid, 2, "B"));
        feed.publish(&message(&oid, 3, "C"));
        assert_eq!(sub.recv().await.unwrap().body, "A");
        assert_eq!(sub.recv().await.unwrap().body, "B");
        assert_eq!(sub.recv().await.unwrap().body, "C");
    }

    #[tokio::test]
    async fn orders_are_isolated() {
        let feed = MessageFeed::new();
        let a = OrderId("ord-00000000000a".into());
        let b = OrderId("ord-00000000000b".into());
        let mut sub_a = feed.subscribe(&a);
        let _sub_b = feed.subscribe(&b);
        feed.publish(&message(&b, 1, "for b"));
        feed.publish(&message(&a, 2, "for a"));
        assert_eq!(sub_a.recv().await.unwrap().body, "for a");
        assert!(sub_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn cancel_is_synchronous() {
        let feed = MessageFeed::new();
        let oid = OrderId("ord-0000000000ca".into());
        let sub = feed.subscribe(&oid);
        assert_eq!(feed.subscriber_count(&oid), 1);
        sub.cancel();
        assert_eq!(feed.subscriber_count(&oid), 0);
        // Publishing after cancel is a no-op, not an error.
        feed.publish(&message(&oid, 1, "lost"));
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let feed = MessageFeed::new();
        let oid = OrderId("ord-00000000multi".into());
        let mut s1 = feed.subscribe(&oid);
        let mut s2 = feed.subscribe(&oid);
        feed.publish(&message(&oid, 1, "hello"));
        assert_eq!(s1.recv().await.unwrap().body, "hello");
        assert_eq!(s2.recv().await.unwrap().body, "hello");
    }
}
