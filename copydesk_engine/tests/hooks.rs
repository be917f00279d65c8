//! Event hook wiring tests: every engine action fires its hook exactly once.
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use copydesk_engine::{
    db_types::PaymentConfirmation,
    events::{EventHandlers, EventHooks},
    messaging::MessageFeed,
    OrderFlowApi,
};
use futures_util::FutureExt;
use log::*;

mod support;

use support::{blog_post_order, client, setup, tear_down};

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn on_order_created() {
    let mut db = setup().await;
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_created(move |ev| {
        info!("🪝️ {:?}", ev.order.order_id);
        event_copy.called();
        async {}.boxed()
    });
    let handlers = EventHandlers::new(8, hooks);
    let api = OrderFlowApi::new(db.clone(), handlers.producers(), MessageFeed::new());

    api.process_new_order(&client("alice@example.com"), blog_post_order("alice@example.com")).await.unwrap();
    api.process_new_order(&client("bob@example.com"), blog_post_order("bob@example.com")).await.unwrap();

    // Dropping the api drops the producers, letting the handler drain and shut down.
    drop(api);
    if let Some(handler) = handlers.on_order_created {
        handler.start_handler().await;
    }
    assert_eq!(event.count(), 2);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn on_order_paid() {
    let mut db = setup().await;
    let event = HookCalled::default();
    let event_copy = event.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |ev| {
        info!("🪝️ paid: {:?}", ev.order.order_id);
        event_copy.called();
        async {}.boxed()
    });
    let handlers = EventHandlers::new(8, hooks);
    let api = OrderFlowApi::new(db.clone(), handlers.producers(), MessageFeed::new());

    let order =
        api.process_new_order(&client("alice@example.com"), blog_post_order("alice@example.com")).await.unwrap();
    let confirmation = PaymentConfirmation {
        event_id: "evt_hook".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    };
    api.confirm_payment(confirmation.clone()).await.unwrap();
    // A replayed webhook must not fire the hook again.
    api.confirm_payment(confirmation).await.unwrap();

    drop(api);
    if let Some(handler) = handlers.on_order_paid {
        handler.start_handler().await;
    }
    assert_eq!(event.count(), 1);
    tear_down(&mut db).await;
}
