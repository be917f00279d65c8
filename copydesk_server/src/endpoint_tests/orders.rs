use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Days, TimeZone, Utc};
use copydesk_engine::{
    db_types::{ContentType, DeadlineTier, Order, OrderId, OrderStatusType, Role, Roles},
    AccountApi,
};
use cpd_common::UsdCents;
use log::debug;

use super::helpers::{get_request, issue_token};
use crate::{
    auth::JwtClaims,
    endpoint_tests::mocks::MockOrderManager,
    routes::{MyOrdersRoute, OrdersSearchRoute},
};

#[actix_web::test]
async fn fetch_my_orders_no_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "An access token is required. Authenticate with /auth first.");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(vec![Role::Client]);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDERS_JSON);
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token(vec![Role::Client]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    debug!("Calling /orders with tampered token {token}");
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert!(err.starts_with("An error occurred validating the access token."), "got: {err}");
}

#[actix_web::test]
async fn search_orders_as_admin() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(vec![Role::Admin]);
    let (status, _body) = get_request(&token, "/search/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn search_orders_as_client_is_denied() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(vec![Role::Client]);
    let err = get_request(&token, "/search/orders", configure).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

fn valid_token(roles: Vec<Role>) -> String {
    issue_token(
        JwtClaims {
            sub: "user-1".into(),
            email: "casey@example.com".into(),
            name: "Casey Client".into(),
            roles: Roles(roles),
            iat: Utc::now().timestamp(),
            exp: 0,
        },
        Utc::now() + Days::new(1),
    )
}

fn configure(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager.expect_orders_for_client().returning(move |_, _| Ok(orders_response()));
    order_manager.expect_orders_for_writer().returning(move |_| Ok(orders_response()));
    order_manager.expect_search_orders().returning(move |_| Ok(orders_response()));
    let accounts_api = AccountApi::new(order_manager);
    cfg.service(MyOrdersRoute::<MockOrderManager>::new())
        .service(OrdersSearchRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(accounts_api));
}

// Mock response to the order listing calls
fn orders_response() -> Vec<Order> {
    vec![
        Order {
            id: 1,
            order_id: OrderId("ord-000000000001".into()),
            order_number: 1001,
            client_email: "casey@example.com".into(),
            client_id: Some("user-1".into()),
            content_type: ContentType::BlogPost,
            word_count: 1000,
            title: "Ten headline formulas".into(),
            description: "A round-up post.".into(),
            keywords: None,
            expertise: None,
            deadline: DeadlineTier::Rush48h,
            due_at: Utc.with_ymd_and_hms(2024, 3, 2, 13, 30, 0).unwrap(),
            client_price: UsdCents::from(15_600),
            writer_id: None,
            writer_price: None,
            writer_deadline: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
            status: OrderStatusType::PendingPayment,
        },
        Order {
            id: 2,
            order_id: OrderId("ord-000000000002".into()),
            order_number: 1002,
            client_email: "casey@example.com".into(),
            client_id: Some("user-1".into()),
            content_type: ContentType::WebCopy,
            word_count: 400,
            title: "Landing page refresh".into(),
            description: "Hero and feature sections.".into(),
            keywords: Some("saas,copy".into()),
            expertise: None,
            deadline: DeadlineTier::SevenDays,
            due_at: Utc.with_ymd_and_hms(2024, 3, 22, 18, 30, 0).unwrap(),
            client_price: UsdCents::from(6_000),
            writer_id: Some("writer-1".into()),
            writer_price: Some(UsdCents::from(3_000)),
            writer_deadline: Some(Utc.with_ymd_and_hms(2024, 3, 20, 18, 30, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 16, 11, 20, 0).unwrap(),
            status: OrderStatusType::Writing,
        },
    ]
}

const ORDERS_JSON: &str = r#"{"total_value":21600,"orders":[{"id":1,"order_id":"ord-000000000001","order_number":1001,"client_email":"casey@example.com","client_id":"user-1","content_type":"blog_post","word_count":1000,"title":"Ten headline formulas","description":"A round-up post.","keywords":null,"expertise":null,"deadline":"48h","due_at":"2024-03-02T13:30:00Z","client_price":15600,"writer_id":null,"writer_price":null,"writer_deadline":null,"created_at":"2024-02-29T13:30:00Z","updated_at":"2024-02-29T13:30:00Z","status":"pending_payment"},{"id":2,"order_id":"ord-000000000002","order_number":1002,"client_email":"casey@example.com","client_id":"user-1","content_type":"web_copy","word_count":400,"title":"Landing page refresh","description":"Hero and feature sections.","keywords":"saas,copy","expertise":null,"deadline":"7d","due_at":"2024-03-22T18:30:00Z","client_price":6000,"writer_id":"writer-1","writer_price":3000,"writer_deadline":"2024-03-20T18:30:00Z","created_at":"2024-03-15T18:30:00Z","updated_at":"2024-03-16T11:20:00Z","status":"writing"}]}"#;
