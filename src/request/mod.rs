pub mod envelope;
pub mod error;
pub mod handlers;
pub mod interception;
pub mod normalizer;
pub mod settlement;
pub mod transport;
pub mod types;
