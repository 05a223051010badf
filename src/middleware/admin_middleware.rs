/// Admin Guard Middleware
///
/// Lets a request through only when the `User` injected by `JwtMiddleware`
/// has the ADMIN role. Must be wrapped inside `JwtMiddleware`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::error::{AppError, AuthError};
use crate::user::User;

pub struct AdminMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AdminMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AdminMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AdminMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminMiddlewareService<S>
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
        let caller = req.extensions().get::<User>().map(|user| (user.id, user.is_admin()));
        let service = self.service.clone();

        Box::pin(async move {
            match caller {
                Some((_, true)) => service.call(req).await,
                Some((user_id, false)) => {
                    tracing::warn!(user_id = %user_id, path = %req.path(), "Non-admin denied");
                    Err(AppError::from(AuthError::Forbidden).into())
                }
                // Mounted without JwtMiddleware in front
                None => Err(AppError::from(AuthError::MissingToken).into()),
            }
        })
    }
}
