//! Background release of holds.
//!
//! Callers enqueue and move on; a worker calls the gate with a bounded number
//! of attempts. A hold that still cannot be released expires on its own once
//! the hold window passes.

use std::{sync::Arc, time::Duration};

use log::{error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::gate::SessionGate;

#[derive(Clone, Copy, Debug)]
pub struct ReleasePolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

/// One hold to clear. With a customer the gate leaves the session alone if
/// someone else holds it by the time the job runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseJob {
    pub session_id: Uuid,
    pub customer_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ReleaseQueue {
    tx: UnboundedSender<ReleaseJob>,
}

impl ReleaseQueue {
    /// Queue whose receiving end the caller drives itself.
    pub fn channel() -> (Self, UnboundedReceiver<ReleaseJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReleaseQueue { tx }, rx)
    }

    /// Queue backed by a worker task on the current runtime.
    pub fn spawn(gate: Arc<dyn SessionGate>, policy: ReleasePolicy) -> Self {
        let (queue, rx) = Self::channel();
        tokio::spawn(run_worker(rx, gate, policy));
        queue
    }

    /// Never fails the caller; a closed queue is logged.
    pub fn enqueue(&self, session_id: Uuid, customer_id: Option<Uuid>) {
        let job = ReleaseJob {
            session_id,
            customer_id,
        };
        if let Err(e) = self.tx.send(job) {
            error!("Release queue closed, session {} stays held until expiry", e.0.session_id);
        }
    }
}

async fn run_worker(
    mut rx: UnboundedReceiver<ReleaseJob>,
    gate: Arc<dyn SessionGate>,
    policy: ReleasePolicy,
) {
    info!("Release worker started");
    while let Some(job) = rx.recv().await {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            release_with_retry(gate.as_ref(), job, policy).await;
        });
    }
    info!("Release worker stopped");
}

/// Returns whether the gate acknowledged the release.
pub async fn release_with_retry(gate: &dyn SessionGate, job: ReleaseJob, policy: ReleasePolicy) -> bool {
    let session_id = job.session_id;
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match gate.release(session_id, job.customer_id).await {
            Ok(()) => {
                info!("Released session {} (attempt {})", session_id, attempt);
                return true;
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Release of session {} failed (attempt {}/{}): {}",
                    session_id, attempt, attempts, e
                );
                tokio::time::sleep(policy.retry_delay * attempt).await;
            }
            Err(e) => {
                error!(
                    "Giving up releasing session {} after {} attempts: {}",
                    session_id, attempts, e
                );
            }
        }
    }
    false
}
