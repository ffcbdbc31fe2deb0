use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::{
    error::Rejection, handlers::OutcomeHandlers, interception::InterceptionHook,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Response encoding requested from the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Unspecified,
    Json,
    Text,
}

/// Transport-facing part of a request. The classifier never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    #[serde(default)]
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub format: ResponseFormat,
}

impl TransportOptions {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// Prefix for relative endpoints; absolute endpoints are used as-is.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            default_headers: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
pub struct RequestConfig {
    pub options: TransportOptions,
    pub no_answer_check: bool,
    pub interception: Option<Arc<dyn InterceptionHook>>,
    /// Handlers embedded in the config win over positional ones.
    pub handlers: OutcomeHandlers,
}

impl RequestConfig {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(TransportOptions::new(HttpMethod::Get, endpoint))
    }

    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(TransportOptions::new(HttpMethod::Post, endpoint).with_payload(payload))
    }

    pub fn with_no_answer_check(mut self, no_answer_check: bool) -> Self {
        self.no_answer_check = no_answer_check;
        self
    }

    pub fn with_interception(mut self, hook: impl InterceptionHook + 'static) -> Self {
        self.interception = Some(Arc::new(hook));
        self
    }

    pub fn with_handlers(mut self, handlers: OutcomeHandlers) -> Self {
        self.handlers = handlers;
        self
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("options", &self.options)
            .field("no_answer_check", &self.no_answer_check)
            .field("interception", &self.interception.is_some())
            .field("handlers", &self.handlers)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    pub no_answer_check: bool,
}

impl RequestFlags {
    pub fn no_answer_check() -> Self {
        Self {
            no_answer_check: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(Value),
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn into_result(self) -> Result<Value, Rejection> {
        match self {
            Outcome::Accepted(value) => Ok(value),
            Outcome::Rejected(rejection) => Err(rejection),
        }
    }

    pub fn outcome_name(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => "accepted",
            Outcome::Rejected(_) => "rejected",
        }
    }
}
