//! Remote service status probe.
//!
//! Returns plain strings rather than errors: the reported `status` field,
//! or a sentinel when the service is offline or unreachable.

use std::time::Duration;

use http::Method;
use serde_json::Value;
use url::Url;

use super::transport::{AsyncTransport, BlockingTransport, TransportRequest, TransportResponse};
use crate::modules::proxy::ProxyRoute;

pub const STATUS_URL: &str = "https://api.scret.me/status";
pub const STATUS_UNKNOWN: &str = "unknown";
pub const STATUS_OFFLINE: &str = "API offline";
pub const STATUS_CONNECTION_ERROR: &str = "connection error";

#[derive(Debug, Clone)]
pub struct StatusProbe {
    url: Url,
    timeout: Option<Duration>,
}

impl StatusProbe {
    pub fn new(url: Url) -> Self {
        Self { url, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn check(&self, transport: &dyn BlockingTransport, route: &ProxyRoute) -> String {
        match transport.send(&self.request(route)) {
            Ok(response) => interpret_status(&response),
            Err(err) => {
                log::warn!("status probe failed: {}", err);
                STATUS_CONNECTION_ERROR.to_string()
            }
        }
    }

    pub async fn check_async(&self, transport: &dyn AsyncTransport, route: &ProxyRoute) -> String {
        match transport.send(&self.request(route)).await {
            Ok(response) => interpret_status(&response),
            Err(err) => {
                log::warn!("status probe failed: {}", err);
                STATUS_CONNECTION_ERROR.to_string()
            }
        }
    }

    fn request(&self, route: &ProxyRoute) -> TransportRequest {
        TransportRequest::new(Method::GET, self.url.clone(), route.clone()).with_timeout(self.timeout)
    }
}

/// Maps a status response to the reported status string.
pub fn interpret_status(response: &TransportResponse) -> String {
    if response.status != 200 {
        return STATUS_OFFLINE.to_string();
    }
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| match body.get("status")? {
            Value::String(status) => Some(status.clone()),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| STATUS_UNKNOWN.to_string())
}
