//----------------------------------------------   Checkout  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use checkout_tools::{CheckoutApi, CheckoutSession, CheckoutSessionRequest, LineItem, PaymentEvent, SessionMetadata};
use copydesk_engine::{
    db_types::{OrderId, OrderStatusType, PaymentConfirmation},
    AccountApi,
    OrderFlowApi,
    OrderManagement,
    WorkflowError,
    WorkflowManagement,
};
use cpd_common::UsdCents;
use log::{debug, info, trace, warn};

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{CheckoutParams, JsonResponse},
    errors::ServerError,
    route,
};

route!(create_checkout => Post "/orders/{order_id}/checkout" impl OrderManagement);
/// Creates a hosted checkout session for an order.
///
/// The order must be in `pending_payment` and visible to the caller, and the amount the client shows must
/// equal the stored order price — the stored price is authoritative, so a tampered client cannot
/// underpay. Nothing is written locally: the provider's signed webhook is the only thing that moves the
/// order forward, which also makes retrying this call harmless.
pub async fn create_checkout<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<CheckoutParams>,
    accounts: web::Data<AccountApi<B>>,
    checkout: web::Data<CheckoutApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let amount = UsdCents::from(body.amount);
    debug!("💻️ POST create checkout for {order_id} at {amount}");
    let detail = accounts
        .order_detail(&claims.actor(), &order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    let order = detail.order;
    if order.status != OrderStatusType::PendingPayment {
        return Err(ServerError::ConflictError(format!("order {order_id} is {}, not pending payment", order.status)));
    }
    if order.client_price != amount {
        return Err(ServerError::ValidationError(format!(
            "amount {amount} does not match the order price {}",
            order.client_price
        )));
    }
    let request = CheckoutSessionRequest {
        line_items: vec![LineItem::single(order.title.clone(), order.client_price)],
        mode: "payment".to_string(),
        success_url: options.success_url.clone(),
        cancel_url: format!("{}/{}", options.cancel_url, order.order_id),
        customer_email: order.client_email.clone(),
        metadata: SessionMetadata { order_id: order.order_id.to_string() },
    };
    let session: CheckoutSession = checkout
        .create_checkout_session(&request)
        .await
        .map_err(|e| ServerError::PaymentProviderError(e.to_string()))?;
    info!("💻️ Checkout session {} created for order {order_id}", session.id);
    Ok(HttpResponse::Ok().json(session))
}

route!(payment_webhook => Post "/webhook/payment" impl WorkflowManagement);
/// Webhook endpoint for the checkout provider.
///
/// The HMAC middleware has already verified the signature by the time this runs. Responses are always in
/// the 200 range, otherwise the provider will retry deliveries that can never succeed.
pub async fn payment_webhook<BPay>(
    req: HttpRequest,
    body: web::Json<PaymentEvent>,
    api: web::Data<OrderFlowApi<BPay>>,
) -> HttpResponse
where
    BPay: WorkflowManagement,
{
    trace!("🛒️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    if !event.is_success() {
        debug!("🛒️ Ignoring webhook event {} of kind {}", event.id, event.kind);
        return HttpResponse::Ok().json(JsonResponse::success("Event ignored."));
    }
    let confirmation = PaymentConfirmation {
        event_id: event.id.clone(),
        order_id: OrderId(event.metadata.order_id.clone()),
        amount: UsdCents::from(event.amount),
    };
    let result = match api.confirm_payment(confirmation).await {
        Ok(Some(order)) => {
            info!("🛒️ Order {} (#{}) marked as paid.", order.order_id, order.order_number);
            JsonResponse::success("Payment applied.")
        },
        Ok(None) => {
            info!("🛒️ Event {} already processed.", event.id);
            JsonResponse::success("Event already processed.")
        },
        Err(WorkflowError::OrderNotFound(oid)) => {
            warn!("🛒️ Webhook event {} references unknown order {oid}.", event.id);
            JsonResponse::failure(format!("Unknown order {oid}"))
        },
        Err(WorkflowError::Validation(e)) => {
            warn!("🛒️ Webhook event {} rejected: {e}", event.id);
            JsonResponse::failure(e.to_string())
        },
        Err(WorkflowError::StaleState { actual, .. }) => {
            warn!("🛒️ Webhook event {} arrived while the order is {actual}.", event.id);
            JsonResponse::failure(format!("Order is {actual}"))
        },
        Err(e) => {
            warn!("🛒️ Unexpected error while handling payment webhook. {e}");
            JsonResponse::failure("Unexpected error handling payment event.")
        },
    };
    HttpResponse::Ok().json(result)
}
