//! Access-token middleware.
//!
//! Validates the `Authorization: Bearer` token on every request entering the wrapped scope and stores the
//! decoded [`JwtClaims`] in the request extensions, where the [`JwtClaims`] extractor and the ACL
//! middleware pick them up. Requests without a valid token never reach a handler.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{auth::validate_access_token, config::AuthConfig};

pub struct JwtMiddlewareFactory {
    auth_config: AuthConfig,
}

impl JwtMiddlewareFactory {
    pub fn new(auth_config: AuthConfig) -> Self {
        JwtMiddlewareFactory { auth_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtMiddlewareService { auth_config: self.auth_config.clone(), service: Rc::new(service) })
    }
}

pub struct JwtMiddlewareService<S> {
    auth_config: AuthConfig,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth_config = self.auth_config.clone();
        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    log::debug!("🔒️ No bearer token on request to {}", req.path());
                    ErrorUnauthorized("An access token is required. Authenticate with /auth first.")
                })?;
            let claims = validate_access_token(token, &auth_config).map_err(|e| {
                log::debug!("🔒️ Access token rejected: {e}");
                ErrorUnauthorized(format!("An error occurred validating the access token. {e}"))
            })?;
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
