//! End-to-end order lifecycle tests against a throwaway SQLite database.
use chrono::{Duration, Utc};
use cpd_common::UsdCents;
use copydesk_engine::{
    db_types::{NewMessage, OrderStatusType, PaymentConfirmation, SubmittedWork},
    WorkflowError,
};

mod support;

use support::{admin, blog_post_order, client, order_flow, seed_approved_writer, setup, tear_down, writer};

#[tokio::test]
async fn full_lifecycle_happy_path() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let admin = admin();

    // Client submits anonymously; the engine computes the authoritative price.
    let order = api
        .process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com"))
        .await
        .expect("Error creating order");
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert_eq!(order.client_price, UsdCents::from(15_600));
    assert_eq!(order.order_number, 1001);

    // Exactly one open stage record.
    use copydesk_engine::OrderManagement;
    let stages = db.fetch_stage_history(&order.order_id).await.unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].stage, OrderStatusType::PendingPayment);
    assert!(stages[0].completed_at.is_none());

    // Payment webhook arrives; second delivery of the same event is a no-op.
    let confirmation = PaymentConfirmation {
        event_id: "evt_001".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    };
    let paid = api.confirm_payment(confirmation.clone()).await.expect("Error confirming payment");
    assert_eq!(paid.unwrap().status, OrderStatusType::InProgress);
    let replay = api.confirm_payment(confirmation).await.expect("Replay must not error");
    assert!(replay.is_none());

    // Admin assigns an approved writer.
    seed_approved_writer(&db, "writer-wanda").await;
    let deadline = Utc::now() + Duration::days(2);
    let assigned = api
        .assign_writer(&admin, &order.order_id, "writer-wanda", UsdCents::from(8_000), deadline)
        .await
        .expect("Error assigning writer");
    assert_eq!(assigned.status, OrderStatusType::Writing);
    assert_eq!(assigned.writer_id.as_deref(), Some("writer-wanda"));
    assert_eq!(assigned.writer_price, Some(UsdCents::from(8_000)));

    // Writer submits; admin asks for changes; writer resubmits; admin approves.
    let work = SubmittedWork { content: Some("First draft".into()), file_id: None };
    let submitted = api.submit_work(&writer("writer-wanda"), &order.order_id, work).await.unwrap();
    assert_eq!(submitted.status, OrderStatusType::InReview);

    let revised = api.request_revision(&admin, &order.order_id, "Tighten the intro").await.unwrap();
    assert_eq!(revised.status, OrderStatusType::Writing);

    let work = SubmittedWork { content: Some("Second draft".into()), file_id: None };
    let resubmitted = api.submit_work(&writer("writer-wanda"), &order.order_id, work).await.unwrap();
    assert_eq!(resubmitted.status, OrderStatusType::InReview);

    let completed = api.approve_and_complete(&admin, &order.order_id).await.unwrap();
    assert_eq!(completed.status, OrderStatusType::Completed);

    // Completed is terminal: a further revision request is rejected as stale.
    let err = api.request_revision(&admin, &order.order_id, "One more pass").await.unwrap_err();
    assert!(matches!(err, WorkflowError::StaleState { actual: OrderStatusType::Completed, .. }), "got {err:?}");

    // The stage history shows the whole journey, with only the terminal stage open.
    let stages = db.fetch_stage_history(&order.order_id).await.unwrap();
    let names: Vec<OrderStatusType> = stages.iter().map(|s| s.stage).collect();
    assert_eq!(names, vec![
        OrderStatusType::PendingPayment,
        OrderStatusType::InProgress,
        OrderStatusType::Writing,
        OrderStatusType::InReview,
        OrderStatusType::Revision,
        OrderStatusType::Writing,
        OrderStatusType::InReview,
        OrderStatusType::Completed,
    ]);
    assert_eq!(stages.iter().filter(|s| s.completed_at.is_none()).count(), 1);

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn payment_amount_must_match_order_price() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();

    let confirmation = PaymentConfirmation {
        event_id: "evt_cheap".into(),
        order_id: order.order_id.clone(),
        amount: UsdCents::from(1),
    };
    let err = api.confirm_payment(confirmation).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");

    // The tampered event must not poison the ledger: the true confirmation still works.
    let confirmation = PaymentConfirmation {
        event_id: "evt_cheap".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    };
    let paid = api.confirm_payment(confirmation).await.unwrap();
    assert!(paid.is_some());

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn concurrent_assignments_have_one_winner() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let admin = admin();
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();
    let confirmation = PaymentConfirmation {
        event_id: "evt_100".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    };
    api.confirm_payment(confirmation).await.unwrap();
    seed_approved_writer(&db, "writer-one").await;
    seed_approved_writer(&db, "writer-two").await;

    let deadline = Utc::now() + Duration::days(3);
    let price = UsdCents::from(9_000);
    let (a, b) = tokio::join!(
        api.assign_writer(&admin, &order.order_id, "writer-one", price, deadline),
        api.assign_writer(&admin, &order.order_id, "writer-two", price, deadline),
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one assignment must win: {a:?} / {b:?}");
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(
        matches!(loser, WorkflowError::Conflict(_) | WorkflowError::StaleState { .. }),
        "loser must see a conflict, got {loser:?}"
    );

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn unassigned_writer_cannot_submit() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let admin = admin();
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();
    api.confirm_payment(PaymentConfirmation {
        event_id: "evt_200".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    })
    .await
    .unwrap();
    seed_approved_writer(&db, "writer-real").await;
    let deadline = Utc::now() + Duration::days(3);
    api.assign_writer(&admin, &order.order_id, "writer-real", UsdCents::from(5_000), deadline).await.unwrap();

    let work = SubmittedWork { content: Some("Imposter draft".into()), file_id: None };
    let err = api.submit_work(&writer("writer-imposter"), &order.order_id, work).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)), "got {err:?}");

    // Submissions with neither content nor a file are invalid even for the right writer.
    let err = api.submit_work(&writer("writer-real"), &order.order_id, SubmittedWork::default()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn assignment_preconditions() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let admin = admin();
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();
    api.confirm_payment(PaymentConfirmation {
        event_id: "evt_300".into(),
        order_id: order.order_id.clone(),
        amount: order.client_price,
    })
    .await
    .unwrap();
    let deadline = Utc::now() + Duration::days(3);

    // No profile / no approved application.
    let err = api
        .assign_writer(&admin, &order.order_id, "writer-ghost", UsdCents::from(5_000), deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::WriterNotEligible(_)), "got {err:?}");

    seed_approved_writer(&db, "writer-ok").await;
    // Non-positive price.
    let err =
        api.assign_writer(&admin, &order.order_id, "writer-ok", UsdCents::from(0), deadline).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");
    // Deadline in the past.
    let err = api
        .assign_writer(&admin, &order.order_id, "writer-ok", UsdCents::from(5_000), Utc::now() - Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");

    // Non-admin caller.
    let err = api
        .assign_writer(&client("casey@example.com"), &order.order_id, "writer-ok", UsdCents::from(5_000), deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)), "got {err:?}");

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn anonymous_orders_link_to_a_registered_account() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let order =
        api.process_new_order(&copydesk_engine::policy::Actor::anonymous(), blog_post_order("newuser@example.com"))
            .await
            .unwrap();
    assert!(order.client_id.is_none());

    let actor = client("newuser@example.com");
    let linked = api.link_orders(&actor).await.unwrap();
    assert_eq!(linked, 1);

    use copydesk_engine::OrderManagement;
    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.client_id.as_deref(), Some("user-client"));

    // Linking again is a no-op.
    assert_eq!(api.link_orders(&actor).await.unwrap(), 0);

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn client_cannot_message_foreign_orders() {
    let db = setup().await;
    let api = order_flow(db.clone());
    let order =
        api.process_new_order(&client("casey@example.com"), blog_post_order("casey@example.com")).await.unwrap();

    let outsider = client("mallory@example.com");
    let message = NewMessage::new(order.order_id.clone(), "user-client", "Any progress?");
    let err = api.post_message(&outsider, message).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)), "got {err:?}");

    let mut db = db;
    drop(api);
    tear_down(&mut db).await;
}
