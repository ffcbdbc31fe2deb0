use serde_json::Value;

use crate::request::types::TransportOptions;

/// What a pre-flight hook decided about a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    Proceed,
    Accept(Value),
    Reject(Value),
}

/// Pre-flight hook able to bypass the transport entirely.
///
/// The hook only sees the transport options; settling is always left to the
/// normalizer so a request can never be settled twice.
pub trait InterceptionHook: Send + Sync {
    fn intercept(&self, options: &TransportOptions) -> Interception;
}

impl<F> InterceptionHook for F
where
    F: Fn(&TransportOptions) -> Interception + Send + Sync,
{
    fn intercept(&self, options: &TransportOptions) -> Interception {
        self(options)
    }
}
