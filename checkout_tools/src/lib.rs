//! Client for the hosted checkout provider's REST API.
//!
//! The provider hosts the actual payment pages; Copydesk only creates checkout sessions pointing at an
//! order and receives signed webhook events when a session is paid. Session creation has no local side
//! effects, so callers may retry freely on transient failures.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::CheckoutApi;
pub use config::CheckoutConfig;
pub use data_objects::{
    CheckoutSession,
    CheckoutSessionRequest,
    LineItem,
    PaymentEvent,
    SessionMetadata,
    PAYMENT_SUCCEEDED,
};
pub use error::CheckoutApiError;
