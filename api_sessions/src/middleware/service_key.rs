use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpResponse,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures::future::{Ready, ok};
use log::debug;

pub const SERVICE_KEY_HEADER: &str = "X-API-Key";

/// Lets only callers presenting one of the configured service keys through.
/// With no keys configured every request passes (local development).
pub struct ServiceKeyMiddleware {
    service_api_keys: Rc<Vec<String>>,
}

impl ServiceKeyMiddleware {
    pub fn new(keys: Vec<String>) -> Self {
        ServiceKeyMiddleware {
            service_api_keys: Rc::new(keys),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ServiceKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ServiceKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ServiceKeyMiddlewareService {
            service: Arc::new(service),
            service_api_keys: self.service_api_keys.clone(),
        })
    }
}

pub struct ServiceKeyMiddlewareService<S> {
    service: Arc<S>,
    service_api_keys: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for ServiceKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let valid_api_keys = self.service_api_keys.clone();
        let header_key = req
            .headers()
            .get(SERVICE_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        let path = req.path().to_owned();
        let srv = Arc::clone(&self.service);

        if valid_api_keys.is_empty() || header_key.is_some_and(|key| valid_api_keys.iter().any(|k| k == key)) {
            debug!("Service key accepted for path {}", path);
            let fut = srv.call(req);
            return Box::pin(async move { fut.await.map(|res| res.map_into_boxed_body()) });
        }

        let error_message = if header_key.is_some() {
            "Invalid service api key"
        } else {
            "No service api key provided"
        };

        log::error!("{} for path {}", error_message, path);
        let response = HttpResponse::Unauthorized()
            .json(serde_json::json!({ "error": error_message }))
            .map_into_boxed_body();

        let (request, _payload) = req.into_parts();

        Box::pin(async move { Ok(ServiceResponse::new(request, response)) })
    }
}
