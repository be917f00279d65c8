use actix_web::{http::StatusCode, test, web, App};
use chrono::{DateTime, Utc};
use cpd_common::Secret;
use jsonwebtoken::{encode, EncodingKey, Header};

use crate::{auth::JwtClaims, config::AuthConfig, middleware::JwtMiddlewareFactory};

pub const TEST_JWT_SECRET: &str = "endpoint-test-jwt-secret-0000000000000000";
pub const TEST_IDP_SECRET: &str = "endpoint-test-idp-secret-0000000000000000";

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new(TEST_JWT_SECRET.to_string()),
        idp_secret: Secret::new(TEST_IDP_SECRET.to_string()),
    }
}

/// Signs an access token directly, bypassing `/auth`, so route tests can focus on the route under test.
pub fn issue_token(mut claims: JwtClaims, expiry: DateTime<Utc>) -> String {
    claims.exp = expiry.timestamp();
    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).expect("Error signing test token")
}

/// Runs a GET request against an app configured by `configure`, with all routes behind the JWT
/// middleware. Returns the status and body on success, or the error body for non-2xx responses.
pub async fn get_request<F>(token: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut web::ServiceConfig) {
    let app = App::new()
        .service(web::scope("").wrap(JwtMiddlewareFactory::new(test_auth_config())).configure(configure));
    let app = test::init_service(app).await;
    let mut req = test::TestRequest::get().uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).to_string();
    if status.is_success() {
        Ok((status, body))
    } else {
        Err(body)
    }
}
