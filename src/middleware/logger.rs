use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

/// Per-request access log: method, path, peer, status and latency.
///
/// Goes through the `log` facade; the telemetry subscriber forwards it into
/// tracing.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        // Never log the path of reset links; it carries the token
        let path = redact_path(req.path());
        let peer = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("-")
            .to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start_time.elapsed().as_millis();

            match &result {
                Ok(res) if res.status().is_server_error() => warn!(
                    "{} {} from {} -> {} ({}ms)",
                    method,
                    path,
                    peer,
                    res.status().as_u16(),
                    elapsed
                ),
                Ok(res) => info!(
                    "{} {} from {} -> {} ({}ms)",
                    method,
                    path,
                    peer,
                    res.status().as_u16(),
                    elapsed
                ),
                Err(e) => info!(
                    "{} {} from {} -> {} ({}ms)",
                    method,
                    path,
                    peer,
                    e.as_response_error().status_code().as_u16(),
                    elapsed
                ),
            }

            result
        })
    }
}

fn redact_path(path: &str) -> String {
    const RESET_PREFIX: &str = "/api/v1/auth/reset-password/";

    match path.strip_prefix(RESET_PREFIX) {
        Some(rest) if !rest.is_empty() => format!("{}<redacted>", RESET_PREFIX),
        _ => path.to_string(),
    }
}
