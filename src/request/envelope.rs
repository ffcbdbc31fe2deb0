use serde_json::Value;

pub const ANSWER_KEY: &str = "answer";
pub const ERROR_MESSAGE_KEY: &str = "error";
pub const ERROR_CODE_KEY: &str = "error_code";
pub const INPUT_ERRORS_KEY: &str = "input_errors";
pub const SUCCESS_WORD: &str = "success";

/// Borrowed view over a server payload using the reserved envelope keys.
#[derive(Debug, Clone, Copy)]
pub struct ResponseEnvelope<'a> {
    payload: &'a Value,
}

impl<'a> ResponseEnvelope<'a> {
    pub fn new(payload: &'a Value) -> Self {
        Self { payload }
    }

    pub fn answer(&self) -> Option<&'a str> {
        self.payload.get(ANSWER_KEY).and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.answer() == Some(SUCCESS_WORD)
    }

    /// Declared error message, `null` when the payload carries none.
    pub fn error(&self) -> Value {
        self.payload
            .get(ERROR_MESSAGE_KEY)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn error_code(&self) -> Option<Value> {
        self.payload
            .get(ERROR_CODE_KEY)
            .filter(|code| !code.is_null())
            .cloned()
    }

    /// Per-field validation errors reported alongside a data failure.
    pub fn input_errors(&self) -> Option<Value> {
        self.payload
            .get(INPUT_ERRORS_KEY)
            .filter(|errors| !errors.is_null())
            .cloned()
    }
}

/// Whether a handler result counts as "nothing". Only `null` does; `false`
/// and `""` are still verdicts.
pub fn is_empty_value(value: &Value) -> bool {
    value.is_null()
}
