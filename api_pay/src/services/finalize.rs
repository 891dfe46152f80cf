//! Turning a paid checkout into a booking.
//!
//! The webhook and the success redirect both land here and may run at the
//! same time for the same checkout; the gate's `booksession` is idempotent
//! per customer, so whichever arrives second sees `AlreadyBooked`.

use common::{booking::BookingMetadata, error::Res};
use log::{debug, error, info, warn};

use crate::{
    context::PayContext,
    services::{
        gate::Finalized,
        stripe::{CheckoutSnapshot, WebhookSignal},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeSource {
    Webhook,
    Redirect,
}

impl FinalizeSource {
    /// The webhook waits for money; the redirect also trusts a completed session.
    fn should_book(self, snapshot: &CheckoutSnapshot) -> bool {
        match self {
            FinalizeSource::Webhook => snapshot.paid,
            FinalizeSource::Redirect => snapshot.paid || snapshot.complete,
        }
    }
}

pub async fn finalize(ctx: &PayContext, metadata: &BookingMetadata) -> Res<Finalized> {
    ctx.gate
        .book(metadata.trainer_session_id, metadata.app_customer_id)
        .await
}

/// Session metadata first, then the payment intent's.
async fn resolve_metadata(ctx: &PayContext, snapshot: &CheckoutSnapshot) -> Res<Option<BookingMetadata>> {
    if let Some(metadata) = &snapshot.metadata {
        return Ok(Some(metadata.clone()));
    }
    match &snapshot.payment_intent_id {
        Some(intent_id) => ctx.payments.payment_intent_metadata(intent_id).await,
        None => Ok(None),
    }
}

/// Never fails: a paid checkout that cannot be booked is logged for manual
/// reconciliation and the caller carries on.
pub async fn finalize_checkout(
    ctx: &PayContext,
    snapshot: &CheckoutSnapshot,
    source: FinalizeSource,
) -> Option<Finalized> {
    if !source.should_book(snapshot) {
        info!("Checkout {} not paid yet ({:?}), not booking", snapshot.id, source);
        return None;
    }

    let metadata = match resolve_metadata(ctx, snapshot).await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            error!(
                "Checkout {} is paid but carries no booking metadata; needs manual reconciliation",
                snapshot.id
            );
            return None;
        }
        Err(e) => {
            error!("Could not read metadata for checkout {}: {}", snapshot.id, e);
            return None;
        }
    };

    match finalize(ctx, &metadata).await {
        Ok(outcome) => {
            info!(
                "Checkout {} finalized session {} for {} via {:?}: {:?}",
                snapshot.id, metadata.trainer_session_id, metadata.app_customer_id, source, outcome
            );
            Some(outcome)
        }
        Err(e) => {
            error!(
                "Booking session {} for {} after paid checkout {} failed, needs manual reconciliation: {}",
                metadata.trainer_session_id, metadata.app_customer_id, snapshot.id, e
            );
            None
        }
    }
}

pub async fn handle_webhook_signal(ctx: &PayContext, signal: WebhookSignal) {
    match signal {
        WebhookSignal::Completed(snapshot) => {
            finalize_checkout(ctx, &snapshot, FinalizeSource::Webhook).await;
        }
        WebhookSignal::Abandoned(snapshot) => match resolve_metadata(ctx, &snapshot).await {
            Ok(Some(metadata)) => {
                info!("Checkout {} abandoned, releasing session {}", snapshot.id, metadata.trainer_session_id);
                ctx.releases
                    .enqueue(metadata.trainer_session_id, Some(metadata.app_customer_id));
            }
            Ok(None) => warn!("Abandoned checkout {} carries no booking metadata", snapshot.id),
            Err(e) => error!("Could not read metadata for checkout {}: {}", snapshot.id, e),
        },
        WebhookSignal::IntentFailed {
            payment_intent_id,
            metadata,
        } => match metadata {
            Some(metadata) => {
                info!(
                    "Payment {} failed, releasing session {}",
                    payment_intent_id, metadata.trainer_session_id
                );
                ctx.releases
                    .enqueue(metadata.trainer_session_id, Some(metadata.app_customer_id));
            }
            None => debug!("Failed payment {} is not a session purchase", payment_intent_id),
        },
        WebhookSignal::Ignored(event_type) => debug!("Unhandled event type: {}", event_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::release::{ReleaseJob, ReleasePolicy, release_with_retry},
        testing::{open_session, test_context},
    };
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn paid_snapshot(metadata: Option<BookingMetadata>) -> CheckoutSnapshot {
        CheckoutSnapshot {
            id: "cs_test_1".to_string(),
            paid: true,
            complete: true,
            metadata,
            payment_intent_id: Some("pi_test_1".to_string()),
        }
    }

    fn metadata_for(session_id: Uuid) -> BookingMetadata {
        BookingMetadata {
            trainer_session_id: session_id,
            app_customer_id: Uuid::new_v4(),
            trainer_user_id: None,
        }
    }

    #[tokio::test]
    async fn second_finalization_changes_nothing() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        let snapshot = paid_snapshot(Some(metadata_for(session.session_id)));

        let first = finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Webhook).await;
        let row = t.gate.session(session.session_id).unwrap();
        let second = finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Redirect).await;

        assert_eq!(first, Some(Finalized::Booked));
        assert_eq!(second, Some(Finalized::AlreadyBooked));
        assert_eq!(t.gate.session(session.session_id).unwrap(), row);
        assert!(row.booked);
        assert!(!row.lock);
    }

    #[tokio::test]
    async fn concurrent_webhook_and_redirect_book_once() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        let metadata = metadata_for(session.session_id);
        t.ctx.gate.hold(session.session_id, metadata.app_customer_id).await.unwrap();
        let snapshot = paid_snapshot(Some(metadata.clone()));

        let (a, b) = tokio::join!(
            finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Webhook),
            finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Redirect),
        );

        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == Finalized::AlreadyBooked);
        assert_eq!(outcomes, vec![Finalized::Booked, Finalized::AlreadyBooked]);
        assert_eq!(t.gate.book_calls(), 2);

        let row = t.gate.session(session.session_id).unwrap();
        assert!(row.booked);
        assert!(!row.lock);
        assert_eq!(row.customer_id, Some(metadata.app_customer_id));
    }

    #[tokio::test]
    async fn unpaid_completion_does_not_book_from_webhook() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        let mut snapshot = paid_snapshot(Some(metadata_for(session.session_id)));
        snapshot.paid = false;

        assert_eq!(finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Webhook).await, None);
        assert_eq!(t.gate.book_calls(), 0);

        snapshot.complete = false;
        assert_eq!(finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Redirect).await, None);
        assert!(!t.gate.session(session.session_id).unwrap().booked);
    }

    #[tokio::test]
    async fn metadata_falls_back_to_payment_intent() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        let metadata = metadata_for(session.session_id);
        t.payments.put_intent_metadata("pi_test_1", metadata.clone());

        let outcome = finalize_checkout(&t.ctx, &paid_snapshot(None), FinalizeSource::Redirect).await;
        assert_eq!(outcome, Some(Finalized::Booked));
        assert_eq!(
            t.gate.session(session.session_id).unwrap().customer_id,
            Some(metadata.app_customer_id)
        );
    }

    #[tokio::test]
    async fn booked_by_someone_else_is_swallowed() {
        let t = test_context();
        let session = open_session();
        t.gate.insert(session.clone());
        t.ctx.gate.book(session.session_id, Uuid::new_v4()).await.unwrap();

        let snapshot = paid_snapshot(Some(metadata_for(session.session_id)));
        assert_eq!(finalize_checkout(&t.ctx, &snapshot, FinalizeSource::Webhook).await, None);
    }

    #[tokio::test]
    async fn failure_signals_queue_a_release() {
        let mut t = test_context();
        let id = Uuid::new_v4();

        let failed = metadata_for(id);
        handle_webhook_signal(
            &t.ctx,
            WebhookSignal::IntentFailed {
                payment_intent_id: "pi_x".to_string(),
                metadata: Some(failed.clone()),
            },
        )
        .await;
        assert_eq!(
            t.releases.try_recv().unwrap(),
            ReleaseJob {
                session_id: id,
                customer_id: Some(failed.app_customer_id),
            }
        );

        let abandoned = metadata_for(id);
        let mut expired = paid_snapshot(Some(abandoned.clone()));
        expired.paid = false;
        handle_webhook_signal(&t.ctx, WebhookSignal::Abandoned(expired)).await;
        assert_eq!(
            t.releases.try_recv().unwrap().customer_id,
            Some(abandoned.app_customer_id)
        );

        handle_webhook_signal(&t.ctx, WebhookSignal::Ignored("invoice.paid".to_string())).await;
        assert!(t.releases.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_expiry_of_an_old_checkout_keeps_the_new_hold() {
        let mut t = test_context();
        let mut session = open_session();
        let first = metadata_for(session.session_id);
        session.lock = true;
        session.locked_by = Some(first.app_customer_id);
        session.locked_at = Some(Utc::now() - Duration::seconds(1861));
        t.gate.insert(session.clone());

        let second = Uuid::new_v4();
        t.ctx.gate.hold(session.session_id, second).await.unwrap();

        let mut expired = paid_snapshot(Some(first));
        expired.paid = false;
        expired.complete = false;
        handle_webhook_signal(&t.ctx, WebhookSignal::Abandoned(expired)).await;

        let job = t.releases.try_recv().unwrap();
        let policy = ReleasePolicy {
            max_attempts: 1,
            retry_delay: std::time::Duration::from_millis(1),
        };
        assert!(release_with_retry(&*t.gate, job, policy).await);

        let row = t.gate.session(session.session_id).unwrap();
        assert!(row.lock);
        assert_eq!(row.locked_by, Some(second));
        assert!(t.ctx.gate.hold(session.session_id, Uuid::new_v4()).await.is_err());
    }
}
