use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which tier of the pipeline turned the request down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The caller's own `on_accepted` judged an accepted payload unacceptable.
    User,
    /// The transport succeeded but the payload declared a failure.
    Data,
    /// The transport itself failed.
    Server,
    /// An interception hook rejected the request before the transport ran.
    /// Never passed to `on_rejected`; the hook's value is the detail as-is.
    Intercepted,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::User => "user",
            RejectionKind::Data => "data",
            RejectionKind::Server => "server",
            RejectionKind::Intercepted => "intercepted",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: Value,
    pub raw: Value,
    pub error_code: Option<Value>,
    /// Per-field errors from a data failure's `input_errors` key.
    pub input_errors: Option<Value>,
    pub http_status: Option<u16>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, detail: Value, raw: Value) -> Self {
        Self {
            kind,
            detail,
            raw,
            error_code: None,
            input_errors: None,
            http_status: None,
        }
    }

    pub fn with_error_code(mut self, error_code: Option<Value>) -> Self {
        self.error_code = error_code;
        self
    }

    pub fn with_input_errors(mut self, input_errors: Option<Value>) -> Self {
        self.input_errors = input_errors;
        self
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    /// Detail rendered for humans: strings stay bare, anything else as JSON.
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(
                f,
                "{} rejection (status={}): {}",
                self.kind,
                status,
                self.message()
            ),
            None => write!(f, "{} rejection: {}", self.kind, self.message()),
        }
    }
}

impl std::error::Error for Rejection {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportError {
    pub status: Option<u16>,
    pub status_text: String,
    pub body: Option<Value>,
}

impl TransportError {
    pub fn new(status_text: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: status_text.into(),
            body: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::String(self.status_text.clone()))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status={})", self.status_text, status),
            None => write!(f, "{}", self.status_text),
        }
    }
}

impl std::error::Error for TransportError {}

pub fn timeout() -> TransportError {
    TransportError::new("timeout")
}

pub fn parse_error() -> TransportError {
    TransportError::new("parsererror")
}

pub fn network_error() -> TransportError {
    TransportError::new("error")
}
