use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::request::{
    handlers::{FinallyGuard, FinallyHandler, OutcomeHandlers},
    normalizer::OutcomeNormalizer,
    types::{HttpMethod, RequestConfig, RequestFlags, TransportOptions},
};

/// Runs a named action against some state container. The result is expected
/// to be already normalized.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, action: &str, params: Value) -> Result<Value, Value>;
}

/// Surfaces a failure nobody handled (a blocking alert in a UI host).
pub trait RejectionNotifier: Send + Sync {
    fn notify(&self, action: &str, error: &Value);
}

#[derive(Default)]
pub struct LogNotifier;

impl RejectionNotifier for LogNotifier {
    fn notify(&self, action: &str, error: &Value) {
        tracing::warn!(
            target: "loading",
            action = action,
            error = %error,
            "unhandled_action_failure"
        );
    }
}

#[derive(Default)]
pub struct LoadHandlers {
    pub on_accepted: Option<Box<dyn FnOnce(&Value) + Send>>,
    pub on_rejected: Option<Box<dyn FnOnce(&Value) + Send>>,
    pub on_finally: Option<FinallyHandler>,
}

impl LoadHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_accepted<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.on_accepted = Some(Box::new(handler));
        self
    }

    pub fn on_rejected<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
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
}

impl fmt::Debug for LoadHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandlers")
            .field("on_accepted", &self.on_accepted.is_some())
            .field("on_rejected", &self.on_rejected.is_some())
            .field("on_finally", &self.on_finally.is_some())
            .finish()
    }
}

/// An observable in-flight flag bound to action dispatches.
pub struct LoadingState {
    in_flight: watch::Sender<bool>,
    dispatcher: Arc<dyn ActionDispatcher>,
    notifier: Arc<dyn RejectionNotifier>,
}

impl LoadingState {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        let (in_flight, _) = watch::channel(false);
        Self {
            in_flight,
            dispatcher,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RejectionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.in_flight.subscribe()
    }

    pub async fn load(
        &self,
        action: &str,
        params: Value,
        handlers: LoadHandlers,
    ) -> Result<Value, Value> {
        let finally = FinallyGuard::new(handlers.on_finally);
        let in_flight = InFlight::raise(&self.in_flight);
        tracing::debug!(target: "loading", action = action, "load_started");

        let result = self.dispatcher.dispatch(action, params).await;
        match &result {
            Ok(value) => {
                in_flight.clear();
                if let Some(on_accepted) = handlers.on_accepted {
                    on_accepted(value);
                }
            }
            Err(error) => {
                match handlers.on_rejected {
                    Some(on_rejected) => on_rejected(error),
                    None => self.notifier.notify(action, error),
                }
                in_flight.clear();
            }
        }

        finally.finish();
        tracing::debug!(
            target: "loading",
            action = action,
            success = result.is_ok(),
            "load_finished"
        );
        result
    }
}

/// Holds the in-flight flag raised; lowers it on `clear` or on drop, so a
/// panicking handler or a dropped `load` future cannot leave it stuck.
struct InFlight<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> InFlight<'a> {
    fn raise(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self { flag }
    }

    fn clear(self) {}
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTemplate {
    pub method: HttpMethod,
    pub endpoint: String,
    pub no_answer_check: bool,
}

impl ActionTemplate {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            no_answer_check: false,
        }
    }

    pub fn without_answer_check(mut self) -> Self {
        self.no_answer_check = true;
        self
    }
}

/// Dispatches named actions as normalized requests.
pub struct NormalizedActions {
    normalizer: OutcomeNormalizer,
    actions: HashMap<String, ActionTemplate>,
}

impl NormalizedActions {
    pub fn new(normalizer: OutcomeNormalizer) -> Self {
        Self {
            normalizer,
            actions: HashMap::new(),
        }
    }

    pub fn register(mut self, action: impl Into<String>, template: ActionTemplate) -> Self {
        self.actions.insert(action.into(), template);
        self
    }
}

#[async_trait]
impl ActionDispatcher for NormalizedActions {
    async fn dispatch(&self, action: &str, params: Value) -> Result<Value, Value> {
        let template = self
            .actions
            .get(action)
            .ok_or_else(|| Value::String(format!("unknown action '{}'", action)))?;

        let mut options = TransportOptions::new(template.method, template.endpoint.clone());
        if !params.is_null() {
            options = options.with_payload(params);
        }
        let config = RequestConfig::new(options).with_no_answer_check(template.no_answer_check);

        self.normalizer
            .normalize(config, OutcomeHandlers::new(), RequestFlags::default())
            .await
            .into_result()
            .map_err(|rejection| rejection.detail)
    }
}
