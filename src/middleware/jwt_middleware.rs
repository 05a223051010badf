/// JWT Authentication Middleware
///
/// Reads the access token from the `accessToken` cookie or, failing that,
/// the `Authorization: Bearer` header. Valid tokens whose user still exists
/// get their claims and user injected into request extensions.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::CredentialManager;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    manager: CredentialManager,
}

impl JwtMiddleware {
    pub fn new(manager: CredentialManager) -> Self {
        Self { manager }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            manager: self.manager.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    manager: CredentialManager,
}

/// Cookie wins over the header; a blank cookie counts as absent
fn access_token(req: &ServiceRequest) -> Option<String> {
    let cookie = req
        .cookie(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|token| !token.is_empty());
    if cookie.is_some() {
        return cookie;
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = access_token(&req);
        let manager = self.manager.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let authenticated = manager.authenticate(token.as_deref()).await?;

            tracing::debug!(
                user_id = %authenticated.user.id,
                path = %req.path(),
                "JWT validated successfully"
            );

            req.extensions_mut().insert(authenticated.claims);
            req.extensions_mut().insert(authenticated.user);

            service.call(req).await
        })
    }
}
