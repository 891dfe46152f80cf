use actix_web::{HttpResponse, get, web};
use common::misc::safe_redirect;
use log::{error, warn};

use crate::{
    context::PayContext,
    dtos::pay::{CancelQuery, SuccessQuery},
    services::finalize::{FinalizeSource, finalize_checkout},
};

/// Stripe sends the browser here after payment. Books the session if the
/// checkout is paid, then redirects whatever happened.
#[get("/success")]
pub async fn get_success(ctx: web::Data<PayContext>, query: web::Query<SuccessQuery>) -> HttpResponse {
    let target = safe_redirect(query.redirect.as_deref(), &ctx.settings.domain);

    match ctx.payments.retrieve_checkout(&query.cs).await {
        Ok(snapshot) => {
            finalize_checkout(&ctx, &snapshot, FinalizeSource::Redirect).await;
        }
        Err(e) => error!("Could not retrieve checkout {}: {}", query.cs, e),
    }

    common::http::Success::found(&target)
}

/// Stripe's cancel link. The holder's hold is released in the background;
/// a link without `customerId` only redirects.
#[get("/cancel")]
pub async fn get_cancel(ctx: web::Data<PayContext>, query: web::Query<CancelQuery>) -> HttpResponse {
    match query.customer_id {
        Some(customer_id) => ctx.releases.enqueue(query.session_id, Some(customer_id)),
        None => warn!(
            "Cancel for session {} without customerId, leaving the hold to expire",
            query.session_id
        ),
    }
    common::http::Success::found(&safe_redirect(query.redirect.as_deref(), &ctx.settings.domain))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, http::header, test, web};
    use common::booking::BookingMetadata;
    use uuid::Uuid;

    use crate::{
        services::{release::ReleaseJob, stripe::CheckoutSnapshot},
        testing::{open_session, test_context},
    };

    fn location(res: &actix_web::dev::ServiceResponse) -> String {
        res.headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[actix_web::test]
    async fn paid_checkout_is_booked_and_redirected() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        let customer = Uuid::new_v4();
        t.payments.put_checkout(CheckoutSnapshot {
            id: "cs_paid".to_string(),
            paid: true,
            complete: true,
            metadata: Some(BookingMetadata {
                trainer_session_id: session.session_id,
                app_customer_id: customer,
                trainer_user_id: None,
            }),
            payment_intent_id: None,
        });

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(t.ctx.clone()))
                .service(crate::mount_pay(Vec::new())),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/sessionpayment/success?cs=cs_paid&redirect=https%3A%2F%2Ffitnest.test%2Fme")
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://fitnest.test/me");
        let row = t.gate.session(session.session_id).unwrap();
        assert!(row.booked);
        assert_eq!(row.customer_id, Some(customer));
    }

    #[actix_web::test]
    async fn unpaid_or_unknown_checkout_still_redirects() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        t.payments.put_checkout(CheckoutSnapshot {
            id: "cs_open".to_string(),
            paid: false,
            complete: false,
            metadata: Some(BookingMetadata {
                trainer_session_id: session.session_id,
                app_customer_id: Uuid::new_v4(),
                trainer_user_id: None,
            }),
            payment_intent_id: None,
        });

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(t.ctx.clone()))
                .service(crate::mount_pay(Vec::new())),
        )
        .await;

        for cs in ["cs_open", "cs_missing"] {
            let req = test::TestRequest::get()
                .uri(&format!("/sessionpayment/success?cs={}&redirect=https://evil.test", cs))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::FOUND);
            assert_eq!(location(&res), "https://fitnest.test");
        }
        assert!(!t.gate.session(session.session_id).unwrap().booked);
        assert_eq!(t.gate.book_calls(), 0);
    }

    #[actix_web::test]
    async fn cancel_queues_release_for_the_holder() {
        let mut t = test_context();
        let id = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(t.ctx.clone()))
                .service(crate::mount_pay(Vec::new())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/sessionpayment/cancel?sessionId={}&customerId={}", id, customer))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "https://fitnest.test");
        assert_eq!(
            t.releases.try_recv().unwrap(),
            ReleaseJob {
                session_id: id,
                customer_id: Some(customer),
            }
        );

        let req = test::TestRequest::get()
            .uri(&format!("/sessionpayment/cancel?sessionId={}", id))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert!(t.releases.try_recv().is_err());
    }
}
