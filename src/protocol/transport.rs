//! Blocking and async transports.
//!
//! The dispatcher talks to the network only through [`BlockingTransport`] and
//! [`AsyncTransport`]. The reqwest-backed implementations keep one client per
//! [`ProxyRoute`], built lazily on first use.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use crate::modules::proxy::ProxyRoute;

/// Fully resolved request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub route: ProxyRoute,
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url, route: ProxyRoute) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            route,
            timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("proxy error: {0}")]
    Proxy(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error, route: &ProxyRoute) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() && route.endpoint().is_some() {
            TransportError::Proxy(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Transport used by the blocking send path.
pub trait BlockingTransport: Send + Sync {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Transport used by the non-blocking send path.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Reqwest async client pool keyed by route.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: tokio::sync::Mutex<HashMap<ProxyRoute, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, route: &ProxyRoute) -> Result<reqwest::Client, TransportError> {
        let mut guard = self.clients.lock().await;
        if let Some(client) = guard.get(route) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = route
            .reqwest_proxy()
            .map_err(|err| TransportError::Proxy(err.to_string()))?
        {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        guard.insert(route.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client(&request.route).await?;

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::from_reqwest(err, &request.route))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::from_reqwest(err, &request.route))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Reqwest blocking client pool keyed by route.
///
/// Blocking clients own an internal runtime, so this transport must not be
/// used from inside an async context.
#[derive(Default)]
pub struct BlockingReqwestTransport {
    clients: Mutex<HashMap<ProxyRoute, reqwest::blocking::Client>>,
}

impl BlockingReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, route: &ProxyRoute) -> Result<reqwest::blocking::Client, TransportError> {
        let mut guard = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = guard.get(route) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::blocking::Client::builder();
        if let Some(proxy) = route
            .reqwest_proxy()
            .map_err(|err| TransportError::Proxy(err.to_string()))?
        {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        guard.insert(route.clone(), client.clone());
        Ok(client)
    }
}

impl BlockingTransport for BlockingReqwestTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client(&request.route)?;

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .map_err(|err| TransportError::from_reqwest(err, &request.route))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|err| TransportError::from_reqwest(err, &request.route))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(route: ProxyRoute) -> TransportRequest {
        TransportRequest::new(
            Method::GET,
            Url::parse("http://127.0.0.1:9/status").unwrap(),
            route,
        )
        .with_timeout(Some(Duration::from_secs(2)))
    }

    #[test]
    fn success_range() {
        let response = TransportResponse {
            status: 204,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert!(response.is_success());
        assert!(!TransportResponse { status: 429, ..response }.is_success());
    }

    #[test]
    fn invalid_proxy_is_a_proxy_error() {
        let transport = BlockingReqwestTransport::new();
        let err = transport
            .send(&request(ProxyRoute::Custom("::not a url::".into())))
            .unwrap_err();
        assert!(matches!(err, TransportError::Proxy(_)));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_connect() {
        let transport = ReqwestTransport::new();
        let err = transport.send(&request(ProxyRoute::Direct)).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
