use std::{net::SocketAddr, str::FromStr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use checkout_tools::CheckoutApi;
use copydesk_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    messaging::MessageFeed,
    AccountApi,
    AuthApi,
    OrderFlowApi,
    SqliteDatabase,
    WriterApi,
};
use futures::{future::ok, FutureExt};
use log::{info, warn};

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory},
    routes::{
        health,
        ApplyAsWriterRoute,
        AttachFileRoute,
        ApprovedWritersRoute,
        ApproveOrderRoute,
        AssignWriterRoute,
        AuthRoute,
        CancelOrderRoute,
        CheckTokenRoute,
        ClaimOrdersRoute,
        DecideApplicationRoute,
        ListApplicationsRoute,
        MyOrdersRoute,
        NewOrderRoute,
        OrderByIdRoute,
        OrderMessagesRoute,
        OrdersSearchRoute,
        PostMessageRoute,
        RequestRevisionRoute,
        SubmitWorkRoute,
        UpdateRolesRoute,
    },
    checkout_routes::{CreateCheckoutRoute, PaymentWebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // Default event wiring: paid and annulled orders are logged. Deployments that need more (email,
    // storefront sync) add hooks here.
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        async move {
            info!("📬️ Order {} (#{}) has been paid", ev.order.order_id, ev.order.order_number);
        }
        .boxed()
    });
    hooks.on_order_annulled(|ev| {
        async move {
            info!("📬️ Order {} (#{}) was annulled as {}", ev.order.order_id, ev.order.order_number, ev.status);
        }
        .boxed()
    });
    let handlers = EventHandlers::new(32, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let feed = MessageFeed::new();
    let _expiry = start_expiry_worker(db.clone(), producers.clone(), feed.clone(), config.pending_payment_timeout);
    let srv = create_server_instance(config, db, producers, feed)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    feed: MessageFeed,
) -> Result<Server, ServerError> {
    let checkout_api = CheckoutApi::new(config.checkout_config.api.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let bind_host = config.host.clone();
    let bind_port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone(), feed.clone());
        let accounts_api = AccountApi::new(db.clone());
        let auth_api = AuthApi::new(db.clone());
        let writer_api = WriterApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpd::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(writer_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(checkout_api.clone()))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(config.auth.clone()));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(config.auth.clone()))
            .service(CheckTokenRoute::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(ClaimOrdersRoute::<SqliteDatabase>::new())
            .service(AssignWriterRoute::<SqliteDatabase>::new())
            .service(SubmitWorkRoute::<SqliteDatabase>::new())
            .service(RequestRevisionRoute::<SqliteDatabase>::new())
            .service(ApproveOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(OrderMessagesRoute::<SqliteDatabase>::new())
            .service(PostMessageRoute::<SqliteDatabase>::new())
            .service(AttachFileRoute::<SqliteDatabase>::new())
            .service(CreateCheckoutRoute::<SqliteDatabase>::new())
            .service(ApplyAsWriterRoute::<SqliteDatabase>::new())
            .service(ListApplicationsRoute::<SqliteDatabase>::new())
            .service(DecideApplicationRoute::<SqliteDatabase>::new())
            .service(ApprovedWritersRoute::<SqliteDatabase>::new())
            .service(UpdateRolesRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.checkout_config.whitelist.clone();
        let hmac_secret = config.checkout_config.api.webhook_secret.clone();
        let hmac_checks = config.checkout_config.hmac_checks;
        // Middleware runs outermost-last: the IP whitelist check wraps the HMAC check, which wraps the
        // webhook handler itself.
        let checkout_scope = web::scope("/checkout")
            .wrap(HmacMiddlewareFactory::new("X-Checkout-Signature", hmac_secret, hmac_checks))
            .wrap_fn(move |req, srv| {
                // Collect the peer IP from x-forwarded-for or forwarded headers _if_ the corresponding
                // `use_nnn` has been set to true in the configuration. Otherwise, use the peer address
                // from the connection info.
                let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
                let peer_ip = req
                    .headers()
                    .get("X-Forwarded-For")
                    .and_then(|v| use_x_forwarded_for.then(|| v.to_str().ok()).flatten())
                    .or_else(|| {
                        req.headers().get("Forwarded").and_then(|v| use_forwarded.then(|| v.to_str().ok()).flatten())
                    })
                    .or_else(|| peer_addr.as_ref().map(|s| s.as_str()))
                    .and_then(|s| SocketAddr::from_str(s).ok().map(|a| a.ip()).or_else(|| s.parse().ok()));
                let whitelisted = match (peer_ip, &whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("Checkout webhook from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("No IP address found in checkout webhook request, denying access.");
                        false
                    },
                };
                if whitelisted {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(actix_web::error::ErrorForbidden("Unrecognised webhook peer.")))
                        .boxed_local()
                }
            })
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(AuthRoute::<SqliteDatabase>::new())
            .service(NewOrderRoute::<SqliteDatabase>::new())
            .service(api_scope)
            .service(checkout_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_host.as_str(), bind_port))?
    .run();
    Ok(srv)
}
