use std::fmt;

use serde_json::Value;

use crate::request::error::RejectionKind;

pub type AcceptedHandler = Box<dyn FnOnce(&Value) -> Option<Value> + Send>;
pub type RejectedHandler = Box<dyn FnOnce(RejectionKind, &Value, &Value) -> Value + Send>;
pub type FinallyHandler = Box<dyn FnOnce() + Send>;

/// Caller callbacks for one request. Every handler runs at most once.
#[derive(Default)]
pub struct OutcomeHandlers {
    pub on_accepted: Option<AcceptedHandler>,
    pub on_rejected: Option<RejectedHandler>,
    pub on_finally: Option<FinallyHandler>,
}

impl OutcomeHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_accepted<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        self.on_accepted = Some(Box::new(handler));
        self
    }

    pub fn on_rejected<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(RejectionKind, &Value, &Value) -> Value + Send + 'static,
    {
        self.on_rejected = Some(Box::new(handler));
        self
    }

    pub fn on_finally<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_finally = Some(Box::new(handler));
        self
    }

    /// Merges handlers field by field; `self` (the config-embedded set) wins.
    pub fn or(self, positional: OutcomeHandlers) -> OutcomeHandlers {
        OutcomeHandlers {
            on_accepted: self.on_accepted.or(positional.on_accepted),
            on_rejected: self.on_rejected.or(positional.on_rejected),
            on_finally: self.on_finally.or(positional.on_finally),
        }
    }

    pub(crate) fn split(
        self,
    ) -> (
        Option<AcceptedHandler>,
        Option<RejectedHandler>,
        FinallyGuard,
    ) {
        (
            self.on_accepted,
            self.on_rejected,
            FinallyGuard::new(self.on_finally),
        )
    }
}

impl fmt::Debug for OutcomeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeHandlers")
            .field("on_accepted", &self.on_accepted.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .field("on_finally", &self.on_finally.is_some())
            .finish()
    }
}

/// Owns the finalizer and runs it exactly once: on `finish`, or on drop when a
/// handler panics or the request future is dropped before settling.
pub struct FinallyGuard {
    on_finally: Option<FinallyHandler>,
}

impl FinallyGuard {
    pub fn new(on_finally: Option<FinallyHandler>) -> Self {
        Self { on_finally }
    }

    pub fn finish(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(on_finally) = self.on_finally.take() {
            on_finally();
        }
    }
}

impl Drop for FinallyGuard {
    fn drop(&mut self) {
        if self.on_finally.is_some() {
            tracing::warn!(
                target: "request",
                panicking = std::thread::panicking(),
                "finalizer_run_on_unwind"
            );
        }
        self.run();
    }
}
