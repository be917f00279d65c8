//! Webhook endpoint tests run against a real throwaway SQLite database, since the interesting behaviour
//! (idempotence, price validation) lives below the HTTP layer.
use actix_web::{test, web, App};
use chrono::Utc;
use checkout_tools::{PaymentEvent, SessionMetadata, PAYMENT_SUCCEEDED};
use copydesk_engine::{
    db_types::{ContentType, DeadlineTier, NewOrder, Order, OrderStatusType},
    events::EventProducers,
    messaging::MessageFeed,
    policy::Actor,
    test_utils::{prepare_test_env, random_db_path},
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use cpd_common::Secret;

use crate::{
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    checkout_routes::PaymentWebhookRoute,
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_test";

async fn seed_order(db: &SqliteDatabase) -> Order {
    let api = OrderFlowApi::new(db.clone(), EventProducers::default(), MessageFeed::new());
    let order = NewOrder::new(
        "casey@example.com",
        ContentType::BlogPost,
        1000,
        "Webhook test order",
        "One thousand words.",
        DeadlineTier::Rush48h,
    );
    api.process_new_order(&Actor::anonymous(), order).await.expect("Error seeding order")
}

fn event_body(order: &Order, event_id: &str) -> String {
    let event = PaymentEvent {
        id: event_id.to_string(),
        kind: PAYMENT_SUCCEEDED.to_string(),
        session_id: "cs_test_1".to_string(),
        amount: order.client_price.value(),
        metadata: SessionMetadata { order_id: order.order_id.to_string() },
        created_at: Utc::now(),
    };
    serde_json::to_string(&event).unwrap()
}

async fn post_webhook(db: &SqliteDatabase, body: &str, signature: Option<&str>) -> u16 {
    let api = OrderFlowApi::new(db.clone(), EventProducers::default(), MessageFeed::new());
    let app = App::new().app_data(web::Data::new(api)).service(
        web::scope("/checkout")
            .wrap(HmacMiddlewareFactory::new("X-Checkout-Signature", Secret::new(WEBHOOK_SECRET.to_string()), true))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new()),
    );
    let app = test::init_service(app).await;
    let mut req = test::TestRequest::post()
        .uri("/checkout/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header(("X-Checkout-Signature", sig.to_string()));
    }
    let res = test::call_service(&app, req.to_request()).await;
    res.status().as_u16()
}

#[actix_web::test]
async fn signed_payment_event_moves_the_order() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 1).await.unwrap();
    let order = seed_order(&db).await;

    let body = event_body(&order, "evt_http_1");
    let sig = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    assert_eq!(post_webhook(&db, &body, Some(&sig)).await, 200);
    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::InProgress);

    // Replay: still 200, still in_progress, no error.
    assert_eq!(post_webhook(&db, &body, Some(&sig)).await, 200);
    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::InProgress);
}

#[actix_web::test]
async fn unsigned_or_tampered_events_are_rejected() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 1).await.unwrap();
    let order = seed_order(&db).await;

    let body = event_body(&order, "evt_http_2");
    // Missing signature.
    assert_eq!(post_webhook(&db, &body, None).await, 403);
    // Signature computed with the wrong secret.
    let bad_sig = calculate_hmac("whsec_wrong", body.as_bytes());
    assert_eq!(post_webhook(&db, &body, Some(&bad_sig)).await, 403);
    // Body altered after signing.
    let sig = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let tampered = body.replace(&order.client_price.value().to_string(), "1");
    assert_eq!(post_webhook(&db, &tampered, Some(&sig)).await, 403);

    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
}
