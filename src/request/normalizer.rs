use std::{sync::Arc, time::Instant};

use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::request::{
    envelope::{ResponseEnvelope, is_empty_value},
    error::{Rejection, RejectionKind, TransportError},
    handlers::{AcceptedHandler, OutcomeHandlers, RejectedHandler},
    interception::Interception,
    settlement::{PendingOutcome, settlement},
    transport::Transport,
    types::{Outcome, RequestConfig, RequestFlags, ResponseFormat},
};

/// Turns one transport call into exactly one accepted/rejected outcome.
///
/// Per request the order is fixed: classify, `on_accepted` (accepted path
/// only), `on_rejected` if the request is rejected, `on_finally`, settle.
#[derive(Clone)]
pub struct OutcomeNormalizer {
    transport: Arc<dyn Transport>,
}

impl OutcomeNormalizer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn normalize(
        &self,
        config: RequestConfig,
        handlers: OutcomeHandlers,
        flags: RequestFlags,
    ) -> Outcome {
        let request_id = Uuid::now_v7().to_string();
        let request_span = tracing::info_span!(
            target: "request",
            "normalize_request",
            request_id = %request_id,
            method = config.options.method.as_str(),
            endpoint = %config.options.endpoint,
        );

        self.normalize_inner(config, handlers, flags)
            .instrument(request_span)
            .await
    }

    /// Runs the request on the tokio runtime and hands back the awaiting half
    /// of its settlement. A handler panic leaves it `Abandoned`.
    pub fn dispatch(
        &self,
        config: RequestConfig,
        handlers: OutcomeHandlers,
        flags: RequestFlags,
    ) -> PendingOutcome {
        let (channel, pending) = settlement();
        let normalizer = self.clone();
        tokio::spawn(async move {
            let outcome = normalizer.normalize(config, handlers, flags).await;
            channel.settle(outcome);
        });
        pending
    }

    async fn normalize_inner(
        &self,
        mut config: RequestConfig,
        handlers: OutcomeHandlers,
        flags: RequestFlags,
    ) -> Outcome {
        let started_at = Instant::now();
        config.options.format = ResponseFormat::Json;
        let no_answer_check = config.no_answer_check || flags.no_answer_check;
        let handlers = std::mem::take(&mut config.handlers).or(handlers);
        let (on_accepted, on_rejected, finally) = handlers.split();

        tracing::debug!(
            target: "request",
            no_answer_check = no_answer_check,
            intercepted = config.interception.is_some(),
            "request_started"
        );

        if let Some(hook) = config.interception.as_ref() {
            let short_circuit = match hook.intercept(&config.options) {
                Interception::Proceed => None,
                Interception::Accept(value) => Some(Outcome::Accepted(value)),
                Interception::Reject(value) => Some(Outcome::Rejected(Rejection::new(
                    RejectionKind::Intercepted,
                    value.clone(),
                    value,
                ))),
            };

            if let Some(outcome) = short_circuit {
                tracing::debug!(
                    target: "request",
                    outcome = outcome.outcome_name(),
                    "request_intercepted"
                );
                finally.finish();
                return outcome;
            }
        }

        let outcome = match self.transport.send(config.options).await {
            Ok(data) => classify_payload(data, no_answer_check, on_accepted, on_rejected),
            Err(err) => {
                tracing::debug!(
                    target: "request",
                    status = ?err.status,
                    status_text = %err.status_text,
                    "transport_failed"
                );
                classify_failure(err, on_rejected)
            }
        };

        finally.finish();
        match &outcome {
            Outcome::Accepted(_) => tracing::debug!(
                target: "request",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "request_settled"
            ),
            Outcome::Rejected(rejection) => tracing::debug!(
                target: "request",
                kind = %rejection.kind,
                detail = %rejection.message(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "request_settled"
            ),
        }
        outcome
    }
}

fn classify_payload(
    data: Value,
    no_answer_check: bool,
    on_accepted: Option<AcceptedHandler>,
    on_rejected: Option<RejectedHandler>,
) -> Outcome {
    if no_answer_check || ResponseEnvelope::new(&data).is_success() {
        let verdict = on_accepted
            .and_then(|on_accepted| on_accepted(&data))
            .filter(|verdict| !is_empty_value(verdict));

        return match verdict {
            None => Outcome::Accepted(data),
            Some(verdict) => {
                let detail = reject_with(on_rejected, RejectionKind::User, &verdict, &verdict);
                Outcome::Rejected(Rejection::new(RejectionKind::User, detail, verdict))
            }
        };
    }

    let envelope = ResponseEnvelope::new(&data);
    let error = envelope.error();
    let error_code = envelope.error_code();
    let input_errors = envelope.input_errors();
    let detail = reject_with(on_rejected, RejectionKind::Data, &error, &data);
    Outcome::Rejected(
        Rejection::new(RejectionKind::Data, detail, data)
            .with_error_code(error_code)
            .with_input_errors(input_errors),
    )
}

fn classify_failure(err: TransportError, on_rejected: Option<RejectedHandler>) -> Outcome {
    let status_text = Value::String(err.status_text.clone());
    let raw = err.to_value();
    let detail = reject_with(on_rejected, RejectionKind::Server, &status_text, &raw);
    Outcome::Rejected(
        Rejection::new(RejectionKind::Server, detail, raw).with_http_status(err.status),
    )
}

fn reject_with(
    on_rejected: Option<RejectedHandler>,
    kind: RejectionKind,
    detail: &Value,
    raw: &Value,
) -> Value {
    match on_rejected {
        Some(on_rejected) => on_rejected(kind, detail, raw),
        None => detail.clone(),
    }
}
