use chrono::{DateTime, Utc};
use cpd_common::UsdCents;
use serde::{Deserialize, Serialize};

pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Unit amount in the smallest currency denomination (cents).
    pub unit_amount: i64,
    pub quantity: u32,
    pub currency: String,
}

impl LineItem {
    pub fn single<S: Into<String>>(name: S, amount: UsdCents) -> Self {
        Self {
            name: name.into(),
            unit_amount: amount.value(),
            quantity: 1,
            currency: cpd_common::USD_CURRENCY_CODE_LOWER.to_string(),
        }
    }
}

/// The request body for creating a hosted checkout session. `metadata.order_id` is echoed back in the
/// webhook event and is how payments are matched to orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<LineItem>,
    pub mode: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A webhook event as delivered by the provider. The HTTP layer verifies the HMAC signature over the raw
/// body before this is ever deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Provider-assigned delivery id; replays carry the same value.
    pub id: String,
    /// Event kind, e.g. "payment.succeeded" or "payment.failed".
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    pub amount: i64,
    pub metadata: SessionMetadata,
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn is_success(&self) -> bool {
        self.kind == PAYMENT_SUCCEEDED
    }
}
