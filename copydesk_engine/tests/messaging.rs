//! Messaging channel tests: per-order FIFO ordering, feed delivery, and subscription cancellation.
use std::collections::HashSet;

use copydesk_engine::{db_types::NewMessage, AccountApi, OrderManagement};

mod support;

use support::{blog_post_order, client, order_flow, setup, tear_down};

#[tokio::test]
async fn messages_read_back_in_post_order() {
    let mut db = setup().await;
    let api = order_flow(db.clone());
    let casey = client("casey@example.com");
    let order = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();

    for body in ["A", "B", "C"] {
        let message = NewMessage::new(order.order_id.clone(), "user-client", body);
        api.post_message(&casey, message).await.unwrap();
    }

    let messages = db.fetch_messages(&order.order_id).await.unwrap();
    let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["A", "B", "C"]);
    assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert!(messages.windows(2).all(|w| w[0].id < w[1].id));

    // Empty messages are rejected.
    let err = api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "  ")).await;
    assert!(err.is_err());

    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn live_subscribers_see_posts_in_order() {
    let mut db = setup().await;
    let api = order_flow(db.clone());
    let casey = client("casey@example.com");
    let order = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();

    let mut sub = api.subscribe_messages(&casey, &order.order_id).await.unwrap();
    api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "first")).await.unwrap();
    api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "second")).await.unwrap();

    assert_eq!(sub.recv().await.unwrap().body, "first");
    assert_eq!(sub.recv().await.unwrap().body, "second");

    // After a synchronous cancel, later posts are not delivered anywhere.
    sub.cancel();
    api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "third")).await.unwrap();

    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn outsiders_cannot_subscribe() {
    let mut db = setup().await;
    let api = order_flow(db.clone());
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();
    let result = api.subscribe_messages(&client("mallory@example.com"), &order.order_id).await;
    assert!(result.is_err());
    drop(api);
    tear_down(&mut db).await;
}

/// A consumer doing "fetch, then subscribe" can see a message twice across the seam; deduplication by
/// message id reconstructs the exact conversation.
#[tokio::test]
async fn fetch_plus_feed_dedupes_by_id() {
    let mut db = setup().await;
    let api = order_flow(db.clone());
    let casey = client("casey@example.com");
    let order = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();

    api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "early")).await.unwrap();
    let mut sub = api.subscribe_messages(&casey, &order.order_id).await.unwrap();
    let fetched = AccountApi::new(db.clone()).messages_for_order(&casey, &order.order_id).await.unwrap().unwrap();
    api.post_message(&casey, NewMessage::new(order.order_id.clone(), "user-client", "late")).await.unwrap();

    let mut seen = HashSet::new();
    let mut conversation = Vec::new();
    for m in fetched {
        if seen.insert(m.id) {
            conversation.push(m);
        }
    }
    while let Some(m) = sub.try_recv() {
        if seen.insert(m.id) {
            conversation.push(m);
        }
    }
    let bodies: Vec<&str> = conversation.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["early", "late"]);

    drop(api);
    tear_down(&mut db).await;
}
