use async_trait::async_trait;
use serde_json::Value;

use crate::request::{error::TransportError, types::TransportOptions};

pub mod http;

/// The network primitive the normalizer wraps. Reports exactly one of a
/// payload or a transport error per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, options: TransportOptions) -> Result<Value, TransportError>;
}
