use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::request::{error::Rejection, types::Outcome};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettleError {
    #[error("request was abandoned before it settled")]
    Abandoned,
}

/// Settling half of a single-shot outcome. Settling consumes the channel.
#[derive(Debug)]
pub struct SettlementChannel {
    tx: oneshot::Sender<Outcome>,
}

/// Awaiting half of a single-shot outcome.
#[derive(Debug)]
pub struct PendingOutcome {
    rx: oneshot::Receiver<Outcome>,
}

pub fn settlement() -> (SettlementChannel, PendingOutcome) {
    let (tx, rx) = oneshot::channel();
    (SettlementChannel { tx }, PendingOutcome { rx })
}

impl SettlementChannel {
    pub fn settle(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            tracing::debug!(target: "request", "settlement_receiver_dropped");
        }
    }

    pub fn settle_accepted(self, value: Value) {
        self.settle(Outcome::Accepted(value));
    }

    pub fn settle_rejected(self, rejection: Rejection) {
        self.settle(Outcome::Rejected(rejection));
    }
}

impl PendingOutcome {
    /// Resolves to `Ok(value)` or `Err(rejection)`; abandonment is folded into
    /// the outer error.
    pub async fn into_result(self) -> Result<Result<Value, Rejection>, SettleError> {
        self.await.map(Outcome::into_result)
    }
}

impl Future for PendingOutcome {
    type Output = Result<Outcome, SettleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx
            .poll_unpin(cx)
            .map(|received| received.map_err(|_| SettleError::Abandoned))
    }
}
