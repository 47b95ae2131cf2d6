//! Actix middleware that binds a [`CorrelationId`] to every request.

use std::future::{ready, Ready};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::id::CorrelationId;
use crate::HEADER_NAME;

/// Reads `X-Correlation-Id` off the inbound request, generating one if
/// absent or unparsable, stores it in request extensions, and echoes it
/// back on the response.
#[derive(Clone, Default)]
pub struct CorrelationIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorrelationIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CorrelationIdMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdMiddlewareService { service }))
    }
}

pub struct CorrelationIdMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(HEADER_NAME)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<CorrelationId>().ok())
            .unwrap_or_default();

        req.extensions_mut().insert(correlation_id.clone());

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let mut response = res.into_response();
            if let Ok(value) = correlation_id.to_string().parse() {
                response.headers_mut().insert(
                    actix_web::http::header::HeaderName::from_static("x-correlation-id"),
                    value,
                );
            }
            Ok(ServiceResponse::new(response.into(), response))
        })
    }
}

/// Fetches the [`CorrelationId`] bound by [`CorrelationIdMiddleware`],
/// generating one if the middleware wasn't mounted (defensive default for
/// handlers exercised outside the normal app pipeline, e.g. tests).
pub fn correlation_id_from_request(req: &HttpRequest) -> CorrelationId {
    req.extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_name_matches_the_propagation_contract() {
        assert_eq!(HEADER_NAME, "x-correlation-id");
    }
}
