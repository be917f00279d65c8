use cpd_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct CheckoutConfig {
    /// Base URL of the provider's API, e.g. "https://api.checkout.example.com".
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// Shared secret for verifying webhook signatures.
    pub webhook_secret: Secret<String>,
}

impl CheckoutConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("CPD_CHECKOUT_API_URL").unwrap_or_else(|_| {
            warn!("CPD_CHECKOUT_API_URL not set, using a placeholder that will not resolve");
            "https://api.checkout.invalid".to_string()
        });
        let secret_key = Secret::new(std::env::var("CPD_CHECKOUT_SECRET_KEY").unwrap_or_else(|_| {
            warn!("CPD_CHECKOUT_SECRET_KEY not set, using a useless default");
            "sk_test_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("CPD_CHECKOUT_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("CPD_CHECKOUT_WEBHOOK_SECRET not set, using a useless default");
            "whsec_00000000000000".to_string()
        }));
        Self { api_url, secret_key, webhook_secret }
    }
}
