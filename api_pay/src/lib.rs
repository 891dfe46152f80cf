use actix_web::web::{self};

pub mod context;

pub mod routes {
    pub mod pay;
    pub mod redirect;
    pub mod webhook;
}

pub mod services {
    pub mod gate;
    pub mod release;
    pub mod store;
    pub mod stripe;

    pub(crate) mod checkout;
    pub(crate) mod finalize;
    pub(crate) mod price;
}

mod dtos {
    pub(crate) mod pay;
}

#[cfg(test)]
pub(crate) mod testing;

pub use context::{PayContext, PaySettings};

/// Checkout and Stripe's browser redirects are public. Price and payout
/// account registration are for other services and need a key from
/// `service_api_keys`.
pub fn mount_pay(service_api_keys: Vec<String>) -> actix_web::Scope {
    web::scope("/sessionpayment")
        .service(routes::pay::post_session_payment)
        .service(
            web::resource("/price")
                .wrap(api_sessions::middleware(service_api_keys.clone()))
                .route(web::post().to(routes::pay::post_session_price)),
        )
        .service(
            web::resource("/account")
                .wrap(api_sessions::middleware(service_api_keys))
                .route(web::post().to(routes::pay::post_connected_account)),
        )
        .service(routes::redirect::get_success)
        .service(routes::redirect::get_cancel)
}
pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/webhook").service(routes::webhook::post_webhook)
}
