use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    Client, Method, StatusCode,
    header::{self, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::request::{
    error::{TransportError, network_error, parse_error, timeout},
    transport::Transport,
    types::{HttpMethod, HttpTransportConfig, ResponseFormat, TransportOptions},
};

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }

        match &self.config.base_url {
            Some(base_url) => format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, options: TransportOptions) -> Result<Value, TransportError> {
        let url = self.resolve_url(&options.endpoint);
        let mut req_builder = self.client.request(to_reqwest_method(options.method), url);

        for (name, value) in self.config.default_headers.iter().chain(options.headers.iter()) {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| network_error())?;
            let value = HeaderValue::from_str(value).map_err(|_| network_error())?;
            req_builder = req_builder.header(name, value);
        }

        if matches!(options.format, ResponseFormat::Json) {
            req_builder = req_builder.header(header::ACCEPT, "application/json");
        }

        if let Some(payload) = &options.payload {
            req_builder = match options.method {
                HttpMethod::Get | HttpMethod::Delete => req_builder.query(&query_pairs(payload)),
                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                    req_builder.json(payload)
                }
            };
        }

        let response = req_builder.send().await.map_err(|err| {
            tracing::debug!(target: "request", error = %err, "http_send_failed");
            if err.is_timeout() { timeout() } else { network_error() }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                timeout().with_status(status.as_u16())
            } else {
                network_error().with_status(status.as_u16())
            }
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        decode_body(options.format, &body).map_err(|err| err.with_status(status.as_u16()))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    let status_text = status.canonical_reason().unwrap_or("error");
    let err = TransportError::new(status_text).with_status(status.as_u16());
    if body.is_empty() {
        return err;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => err.with_body(parsed),
        Err(_) => err.with_body(Value::String(body.chars().take(240).collect())),
    }
}

fn decode_body(format: ResponseFormat, body: &str) -> Result<Value, TransportError> {
    match format {
        ResponseFormat::Json => serde_json::from_str(body).map_err(|_| parse_error()),
        ResponseFormat::Text => Ok(Value::String(body.to_string())),
        ResponseFormat::Unspecified => {
            Ok(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
        }
    }
}
