//! Expiry sweep tests: only over-age `pending_payment` orders are cancelled.
use chrono::Duration;
use copydesk_engine::{
    db_types::{OrderStatusType, PaymentConfirmation},
    OrderManagement,
};

mod support;

use support::{blog_post_order, client, order_flow, setup, tear_down};

#[tokio::test]
async fn sweep_cancels_only_stale_pending_orders() {
    let mut db = setup().await;
    let api = order_flow(db.clone());
    let casey = client("casey@example.com");

    let stale = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();
    let paid = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();
    let fresh = api.process_new_order(&casey, blog_post_order("casey@example.com")).await.unwrap();

    api.confirm_payment(PaymentConfirmation {
        event_id: "evt_exp".into(),
        order_id: paid.order_id.clone(),
        amount: paid.client_price,
    })
    .await
    .unwrap();

    // Backdate two orders beyond the payment window. The paid one must still survive the sweep.
    for oid in [&stale.order_id, &paid.order_id] {
        sqlx::query("UPDATE orders SET updated_at = datetime('now', '-4 days') WHERE order_id = $1")
            .bind(oid.as_str())
            .execute(db.pool())
            .await
            .unwrap();
    }

    let expired = api.expire_stale_orders(Duration::hours(72)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].order_id, stale.order_id);

    assert_eq!(db.fetch_order_by_order_id(&stale.order_id).await.unwrap().unwrap().status, OrderStatusType::Cancelled);
    assert_eq!(db.fetch_order_by_order_id(&paid.order_id).await.unwrap().unwrap().status, OrderStatusType::InProgress);
    assert_eq!(
        db.fetch_order_by_order_id(&fresh.order_id).await.unwrap().unwrap().status,
        OrderStatusType::PendingPayment
    );

    // The cancelled order's history ends with a terminal stage carrying the expiry note.
    let stages = db.fetch_stage_history(&stale.order_id).await.unwrap();
    let last = stages.last().unwrap();
    assert_eq!(last.stage, OrderStatusType::Cancelled);
    assert_eq!(last.notes.as_deref(), Some("Payment window expired"));

    drop(api);
    tear_down(&mut db).await;
}
