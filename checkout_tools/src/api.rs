use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::CheckoutConfig,
    data_objects::{CheckoutSession, CheckoutSessionRequest},
    CheckoutApiError,
};

#[derive(Clone)]
pub struct CheckoutApi {
    config: CheckoutConfig,
    client: Arc<Client>,
}

impl CheckoutApi {
    pub fn new(config: CheckoutConfig) -> Result<Self, CheckoutApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| CheckoutApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| CheckoutApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, CheckoutApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| CheckoutApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| CheckoutApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| CheckoutApiError::RestResponseError(e.to_string()))?;
            Err(CheckoutApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url)
    }

    /// Creates a hosted checkout session and returns its id and redirect URL. Nothing is stored locally;
    /// payment completion arrives later as a signed webhook event.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, CheckoutApiError> {
        debug!("Creating checkout session for order {}", request.metadata.order_id);
        let session =
            self.rest_query::<CheckoutSession, _>(Method::POST, "/checkout/sessions", Some(request)).await?;
        info!("Checkout session {} created for order {}", session.id, request.metadata.order_id);
        Ok(session)
    }
}
