use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use copydesk_engine::{
    db_types::{Profile, Role, Roles},
    AuthApi,
    AuthApiError,
};
use jsonwebtoken::{encode, EncodingKey, Header};

use super::helpers::{test_auth_config, TEST_IDP_SECRET};
use crate::{
    auth::{validate_access_token, LoginToken, TokenIssuer, AUTH_HEADER},
    endpoint_tests::mocks::MockAuthManager,
    routes::AuthRoute,
};

fn login_token(nonce: u64, desired_roles: Vec<Role>, secret: &str) -> String {
    let claims = LoginToken {
        sub: "user-1".into(),
        email: "casey@example.com".into(),
        name: "Casey Client".into(),
        nonce,
        desired_roles: Roles(desired_roles),
        exp: (Utc::now() + Duration::minutes(5)).timestamp(),
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).expect("Error signing login token")
}

fn profile() -> Profile {
    Profile {
        user_id: "user-1".into(),
        display_name: "Casey Client".into(),
        email: "casey@example.com".into(),
        roles: Roles(vec![Role::Client]),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn call_auth(token: &str, auth_manager: MockAuthManager) -> (u16, String) {
    let config = test_auth_config();
    let app = App::new()
        .app_data(web::Data::new(AuthApi::new(auth_manager)))
        .app_data(web::Data::new(TokenIssuer::new(&config)))
        .app_data(web::Data::new(config))
        .service(AuthRoute::<MockAuthManager>::new());
    let app = test::init_service(app).await;
    let req = test::TestRequest::post().uri("/auth").insert_header((AUTH_HEADER, token)).to_request();
    let res = test::call_service(&app, req).await;
    let status = res.status().as_u16();
    let body = String::from_utf8_lossy(&test::read_body(res).await).to_string();
    (status, body)
}

#[actix_web::test]
async fn valid_login_token_yields_access_token() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_upsert_profile().returning(|_| Ok(profile()));
    auth_manager.expect_upsert_nonce_for_user().returning(|_, _| Ok(()));
    auth_manager.expect_check_user_has_roles().returning(|_, _| Ok(()));

    let token = login_token(1, vec![Role::Client], TEST_IDP_SECRET);
    let (status, body) = call_auth(&token, auth_manager).await;
    assert_eq!(status, 200, "body: {body}");
    let claims = validate_access_token(&body, &test_auth_config()).expect("Access token must verify");
    assert_eq!(claims.sub, "user-1");
    assert!(claims.roles.contains(Role::Client));
}

#[actix_web::test]
async fn login_token_with_wrong_secret_is_rejected() {
    let _ = env_logger::try_init().ok();
    let auth_manager = MockAuthManager::new();
    let token = login_token(1, vec![Role::Client], "not-the-shared-secret-000000000000000000");
    let (status, _body) = call_auth(&token, auth_manager).await;
    assert_eq!(status, 401);
}

#[actix_web::test]
async fn replayed_nonce_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_upsert_profile().returning(|_| Ok(profile()));
    auth_manager.expect_upsert_nonce_for_user().returning(|_, _| Err(AuthApiError::InvalidNonce));

    let token = login_token(1, vec![Role::Client], TEST_IDP_SECRET);
    let (status, _body) = call_auth(&token, auth_manager).await;
    assert_eq!(status, 401);
}

#[actix_web::test]
async fn roles_beyond_the_profile_are_refused() {
    let _ = env_logger::try_init().ok();
    let mut auth_manager = MockAuthManager::new();
    auth_manager.expect_upsert_profile().returning(|_| Ok(profile()));
    auth_manager.expect_upsert_nonce_for_user().returning(|_, _| Ok(()));
    auth_manager.expect_check_user_has_roles().returning(|_, _| Err(AuthApiError::RoleNotAllowed(1)));

    let token = login_token(2, vec![Role::Admin], TEST_IDP_SECRET);
    let (status, _body) = call_auth(&token, auth_manager).await;
    assert_eq!(status, 403);
}
