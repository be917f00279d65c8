//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and
//! tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread
//! will cause the current worker to stop processing new requests. For this reason, any long, non-cpu-bound
//! operation (e.g. I/O, database operations, etc.) should be expressed as futures or asynchronous
//! functions. Async handlers get executed concurrently by worker threads and thus don't block execution.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use copydesk_engine::{
    db_types::{NewMessage, NewOrder, NewOrderFile, OrderId, Role, SubmittedWork},
    order_objects::OrderQueryFilter,
    AccountApi,
    AuthApi,
    AuthManagement,
    OrderFlowApi,
    OrderManagement,
    WorkflowManagement,
    WriterApi,
    WriterManagement,
};
use cpd_common::UsdCents;
use log::*;

use crate::{
    auth::{check_login_token_signature, JwtClaims, TokenIssuer},
    config::AuthConfig,
    data_objects::{
        ApplicationDecisionParams,
        AssignWriterParams,
        CancelParams,
        JsonResponse,
        NewFileParams,
        NewMessageParams,
        NotesParams,
        RoleUpdateRequest,
        SubmitWorkParams,
        WriterApplicationParams,
    },
    errors::ServerError,
};

// Actix-web cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(auth => Post "/auth" impl AuthManagement);
/// Route handler for the auth endpoint
///
/// This route is used to authenticate a user and issue an access JWT.
///
/// Users must supply a login token in the `cpd_auth_token` header. This token is minted by the identity
/// provider and signed with the secret it shares with this server. It carries (see
/// [`crate::auth::LoginToken`]):
/// * `sub`, `email`, `name` - the verified identity.
/// * `nonce` - a unique number that must increase on every call (not necessarily by 1 - a unix time epoch
///   can be used, for example).
/// * `desired_roles` - the roles the user wants on this session. Only roles the profile actually holds
///   are granted.
///
/// If successful, the server issues an access JWT for use on `/api` routes. The JWT is valid for a
/// relatively short period and will NOT refresh.
pub async fn auth<A>(
    req: HttpRequest,
    api: web::Data<AuthApi<A>>,
    signer: web::Data<TokenIssuer>,
    auth_config: web::Data<AuthConfig>,
) -> Result<HttpResponse, ServerError>
where
    A: AuthManagement,
{
    trace!("💻️ Received auth request");
    let payload = req.headers().get(crate::auth::AUTH_HEADER).ok_or(ServerError::CouldNotDeserializeAuthToken)?;
    let login_token = payload.to_str().map_err(|e| {
        debug!("💻️ Could not read auth token. {e}");
        ServerError::CouldNotDeserializeAuthToken
    })?;
    let token = check_login_token_signature(login_token, &auth_config)?;
    debug!("💻️ Login token was validated for {}", token.sub);
    let profile = copydesk_engine::db_types::NewProfile {
        user_id: token.sub.clone(),
        display_name: token.name.clone(),
        email: token.email.clone(),
        roles: copydesk_engine::db_types::Roles(vec![Role::Client]),
    };
    api.upsert_profile(profile).await?;
    api.upsert_nonce_for_user(&token.sub, token.nonce).await?;
    trace!("💻️ Confirming auth request is valid for roles for {}", token.sub);
    api.check_user_has_roles(&token.sub, &token.desired_roles.0).await.map_err(|e| {
        debug!("💻️ User cannot be authenticated for requested roles. {e}");
        ServerError::InsufficientPermissions
    })?;
    let access_token = signer.issue_token(token, None)?;
    trace!("💻️ Issued access token");
    Ok(HttpResponse::Ok().content_type("application/json").body(access_token))
}

route!(check_token => Get "/check_token" requires [Role::Client]);
/// A convenience route to check whether an access token is still valid.
pub async fn check_token(claims: JwtClaims) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET check_token for {}", claims.sub);
    Ok(HttpResponse::Ok().json(JsonResponse::success("Token is valid.")))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(new_order => Post "/order" impl WorkflowManagement);
/// Public order intake. Anonymous callers are welcome: the order is keyed on the supplied email until the
/// client registers and claims it. The response carries the engine-computed price; any price the client
/// estimated locally is advisory only.
pub async fn new_order<B: WorkflowManagement>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order for {}", order.client_email);
    let actor = copydesk_engine::policy::Actor::anonymous();
    let order = api.process_new_order(&actor, order).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_orders => Get "/orders" impl OrderManagement);
/// Role-scoped order listing: clients see their own orders, writers the orders assigned to them, admins
/// everything.
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let result = api.orders_for_actor(&claims.actor()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
/// Order detail (order, stage history, files). Returns null for orders that do not exist *or* that the
/// caller may not see, so existence does not leak.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let detail = api.order_detail(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(orders_search => Get "/search/orders" impl OrderManagement where requires [Role::Admin]);
pub async fn orders_search<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders search for [{}]", query.0);
    let orders = api.search_orders(&claims.actor(), query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(claim_orders => Post "/orders/claim" impl WorkflowManagement);
/// Links anonymous orders carrying the caller's verified email to their account. This is the explicit
/// identity-linking step that replaces fragile on-the-fly email matching.
pub async fn claim_orders<B: WorkflowManagement>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST claim_orders for {}", claims.sub);
    let linked = api.link_orders(&claims.actor()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{linked} orders linked"))))
}

route!(assign_writer => Post "/orders/{order_id}/assign" impl WorkflowManagement where requires [Role::Admin]);
/// Admin-only writer assignment. The writer must hold the writer role with an approved application; the
/// price must be positive and the deadline in the future. Once a writer is attached there is no silent
/// reassignment — conflicting calls fail with 409.
pub async fn assign_writer<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<AssignWriterParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let AssignWriterParams { writer_id, writer_price, writer_deadline } = body.into_inner();
    debug!("💻️ POST assign writer {writer_id} to {order_id}");
    let order = api
        .assign_writer(&claims.actor(), &order_id, &writer_id, UsdCents::from(writer_price), writer_deadline)
        .await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(submit_work => Post "/orders/{order_id}/submit" impl WorkflowManagement where requires [Role::Writer]);
/// The assigned writer submits their deliverable: free text, an attached file reference, or both.
pub async fn submit_work<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<SubmitWorkParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let SubmitWorkParams { content, file_id } = body.into_inner();
    debug!("💻️ POST submit work on {order_id} by {}", claims.sub);
    let work = SubmittedWork { content, file_id };
    let order = api.submit_work(&claims.actor(), &order_id, work).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(request_revision => Post "/orders/{order_id}/revision" impl WorkflowManagement where requires [Role::Admin]);
pub async fn request_revision<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<NotesParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST request revision on {order_id}");
    let order = api.request_revision(&claims.actor(), &order_id, &body.notes).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(approve_order => Post "/orders/{order_id}/approve" impl WorkflowManagement where requires [Role::Admin]);
pub async fn approve_order<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST approve order {order_id}");
    let order = api.approve_and_complete(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl WorkflowManagement where requires [Role::Admin]);
pub async fn cancel_order<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<CancelParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST cancel order {order_id}");
    let order = api.cancel_order(&claims.actor(), &order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Messages  ----------------------------------------------------
route!(order_messages => Get "/orders/{order_id}/messages" impl OrderManagement);
pub async fn order_messages<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET messages for {order_id}");
    let messages = api.messages_for_order(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

route!(post_message => Post "/orders/{order_id}/messages" impl WorkflowManagement);
pub async fn post_message<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<NewMessageParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST message on {order_id} from {}", claims.sub);
    let message = NewMessage { order_id, sender_id: claims.sub.clone(), body: body.into_inner().body };
    let message = api.post_message(&claims.actor(), message).await?;
    Ok(HttpResponse::Ok().json(message))
}

//----------------------------------------------   Files  ----------------------------------------------------
route!(attach_file => Post "/orders/{order_id}/files" impl WorkflowManagement);
/// Records file metadata for an order. The bytes themselves go to object storage under the returned
/// `storage_path`; if that upload fails the client should delete the record it created here, and the
/// orphaned path is logged either way.
pub async fn attach_file<A: WorkflowManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<NewFileParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let NewFileParams { file_name, content_type } = body.into_inner();
    debug!("💻️ POST attach file {file_name} to {order_id}");
    let file = NewOrderFile { order_id, uploader_id: claims.sub.clone(), file_name, content_type };
    let file = api.attach_file(&claims.actor(), file).await?;
    Ok(HttpResponse::Ok().json(file))
}

//----------------------------------------------   Writers  ----------------------------------------------------
route!(apply_as_writer => Post "/writers/apply" impl WriterManagement);
pub async fn apply_as_writer<A: WriterManagement>(
    claims: JwtClaims,
    body: web::Json<WriterApplicationParams>,
    api: web::Data<WriterApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST writer application from {}", claims.sub);
    let application = api.submit_application(&claims.actor(), body.into_inner().into_new_application()).await?;
    Ok(HttpResponse::Ok().json(application))
}

route!(list_applications => Get "/writers/applications" impl WriterManagement where requires [Role::Admin]);
pub async fn list_applications<A: WriterManagement>(
    claims: JwtClaims,
    api: web::Data<WriterApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET writer applications");
    let applications = api.list_applications(&claims.actor(), None).await?;
    Ok(HttpResponse::Ok().json(applications))
}

route!(decide_application => Post "/writers/applications/{id}/decide" impl WriterManagement where requires [Role::Admin]);
pub async fn decide_application<A: WriterManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ApplicationDecisionParams>,
    api: web::Data<WriterApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST decide application {id}");
    let application = api.decide_application(&claims.actor(), id, body.approve).await?;
    Ok(HttpResponse::Ok().json(application))
}

route!(approved_writers => Get "/writers" impl WriterManagement where requires [Role::Admin]);
/// The roster for the assignment picker: every writer with an approved application.
pub async fn approved_writers<A: WriterManagement>(
    claims: JwtClaims,
    api: web::Data<WriterApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET approved writers");
    let writers = api.list_approved_writers(&claims.actor()).await?;
    Ok(HttpResponse::Ok().json(writers))
}

//----------------------------------------------   Roles  ----------------------------------------------------
route!(update_roles => Post "/roles" impl AuthManagement where requires [Role::Admin]);
pub async fn update_roles<A: AuthManagement>(
    body: web::Json<RoleUpdateRequest>,
    api: web::Data<AuthApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let RoleUpdateRequest { user_id, apply, revoke } = body.into_inner();
    debug!("💻️ POST update roles for {user_id}");
    if !apply.is_empty() {
        api.assign_roles(&user_id, &apply).await?;
    }
    let mut removed = 0;
    if !revoke.is_empty() {
        removed = api.remove_roles(&user_id, &revoke).await?;
    }
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!(
        "{} roles assigned, {removed} roles revoked",
        apply.len()
    ))))
}
