pub mod config;
pub mod loading;
pub mod logging;
pub mod request;
