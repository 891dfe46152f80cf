use actix_web::web;
use middleware::service_key::ServiceKeyMiddleware;

pub mod routes {
    pub mod session;
}
pub mod middleware {
    pub mod service_key;
}

mod services {
    pub(crate) mod session;
}
mod dtos {
    pub(crate) mod session;
}

/// Booking gate: hold, release, book and inspect trainer sessions.
/// Reached by the payment flow at `TRAINER_SERVICE_URL`.
pub fn mount_gate() -> actix_web::Scope {
    web::scope("/gate")
        .service(routes::session::post_hold)
        .service(routes::session::post_release)
        .service(routes::session::post_book)
        .service(routes::session::get_status)
}
pub fn middleware(service_api_keys: Vec<String>) -> ServiceKeyMiddleware {
    ServiceKeyMiddleware::new(service_api_keys)
}
