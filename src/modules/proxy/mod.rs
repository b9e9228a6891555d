//! Proxy and anonymizing-network routing.
//!
//! Resolves which route outgoing requests take: direct, a caller-supplied
//! HTTP(S)/SOCKS proxy, or the local Tor SOCKS endpoint. The anonymizing
//! toggle wins over the custom endpoint whenever it is enabled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Local SOCKS endpoint of the anonymizing overlay.
pub const ANONYMIZING_ENDPOINT: &str = "socks5h://127.0.0.1:9050";
/// External endpoint used by the reachability probe.
pub const PROBE_URL: &str = "https://httpbin.org/ip";

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "endpoint", rename_all = "snake_case")]
pub enum ProxyRoute {
    Direct,
    Custom(String),
    Anonymizing(String),
}

impl ProxyRoute {
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProxyRoute::Direct => None,
            ProxyRoute::Custom(endpoint) | ProxyRoute::Anonymizing(endpoint) => Some(endpoint),
        }
    }

    /// `{http, https}` pair pointing at the endpoint, empty when direct.
    pub fn as_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(endpoint) = self.endpoint() {
            map.insert("http".to_string(), endpoint.to_string());
            map.insert("https".to_string(), endpoint.to_string());
        }
        map
    }

    pub(crate) fn reqwest_proxy(&self) -> Result<Option<reqwest::Proxy>, reqwest::Error> {
        self.endpoint().map(reqwest::Proxy::all).transpose()
    }
}

#[derive(Debug, Clone)]
pub struct AnonymityRouter {
    custom: Option<String>,
    anonymizing: bool,
    probe_url: String,
}

impl AnonymityRouter {
    pub fn new(custom: Option<String>, anonymizing: bool) -> Self {
        Self {
            custom: custom.filter(|endpoint| !endpoint.is_empty()),
            anonymizing,
            probe_url: PROBE_URL.to_string(),
        }
    }

    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    pub fn set_custom(&mut self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        self.custom = (!endpoint.is_empty()).then_some(endpoint);
    }

    pub fn clear_custom(&mut self) {
        self.custom = None;
    }

    pub fn enable_anonymizing(&mut self) {
        self.anonymizing = true;
    }

    pub fn disable_anonymizing(&mut self) {
        self.anonymizing = false;
    }

    pub fn is_anonymizing(&self) -> bool {
        self.anonymizing
    }

    pub fn effective_route(&self) -> ProxyRoute {
        if self.anonymizing {
            return ProxyRoute::Anonymizing(ANONYMIZING_ENDPOINT.to_string());
        }
        match &self.custom {
            Some(endpoint) => ProxyRoute::Custom(endpoint.clone()),
            None => ProxyRoute::Direct,
        }
    }

    pub fn proxy_map(&self) -> HashMap<String, String> {
        self.effective_route().as_map()
    }

    /// Probes the current route from the calling thread.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`AnonymityRouter::validate_async`] there.
    pub fn validate(&self) -> bool {
        let route = self.effective_route();
        let outcome = (|| -> Result<reqwest::StatusCode, reqwest::Error> {
            let mut builder = reqwest::blocking::Client::builder().timeout(PROBE_TIMEOUT);
            if let Some(proxy) = route.reqwest_proxy()? {
                builder = builder.proxy(proxy);
            }
            let client = builder.build()?;
            Ok(client.get(&self.probe_url).send()?.status())
        })();
        report_probe(&route, outcome)
    }

    pub async fn validate_async(&self) -> bool {
        let route = self.effective_route();
        let outcome = async {
            let mut builder = reqwest::Client::builder().timeout(PROBE_TIMEOUT);
            if let Some(proxy) = route.reqwest_proxy()? {
                builder = builder.proxy(proxy);
            }
            let client = builder.build()?;
            Ok::<_, reqwest::Error>(client.get(&self.probe_url).send().await?.status())
        }
        .await;
        report_probe(&route, outcome)
    }
}

impl Default for AnonymityRouter {
    fn default() -> Self {
        Self::new(None, false)
    }
}

fn report_probe(route: &ProxyRoute, outcome: Result<reqwest::StatusCode, reqwest::Error>) -> bool {
    let target = route.endpoint().unwrap_or("direct");
    match outcome {
        Ok(status) if status == reqwest::StatusCode::OK => {
            log::debug!("route {} reachable", target);
            true
        }
        Ok(status) => {
            log::warn!("route {} probe returned status {}", target, status);
            false
        }
        Err(err) if err.is_timeout() => {
            log::warn!("route {} took too long to respond", target);
            false
        }
        Err(err) if err.is_connect() || err.is_builder() => {
            log::warn!("route {} unusable: {}", target, err);
            false
        }
        Err(err) => {
            log::warn!("route {} probe failed: {}", target, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_by_default() {
        let router = AnonymityRouter::default();
        assert_eq!(router.effective_route(), ProxyRoute::Direct);
        assert!(router.proxy_map().is_empty());
    }

    #[test]
    fn custom_endpoint_for_both_schemes() {
        let mut router = AnonymityRouter::default();
        router.set_custom("http://10.0.0.1:3128");
        let map = router.proxy_map();
        assert_eq!(map.get("http").map(String::as_str), Some("http://10.0.0.1:3128"));
        assert_eq!(map.get("https").map(String::as_str), Some("http://10.0.0.1:3128"));
    }

    #[test]
    fn anonymizing_takes_precedence_and_keeps_custom() {
        let mut router = AnonymityRouter::new(Some("http://10.0.0.1:3128".into()), false);
        router.enable_anonymizing();
        assert_eq!(
            router.effective_route(),
            ProxyRoute::Anonymizing(ANONYMIZING_ENDPOINT.into())
        );

        router.disable_anonymizing();
        assert_eq!(
            router.effective_route(),
            ProxyRoute::Custom("http://10.0.0.1:3128".into())
        );

        router.clear_custom();
        assert_eq!(router.effective_route(), ProxyRoute::Direct);
    }

    #[test]
    fn validate_never_fails_loudly() {
        let router = AnonymityRouter::new(Some("not a proxy url".into()), false)
            .with_probe_url("http://127.0.0.1:9/ip");
        assert!(!router.validate());

        let router = AnonymityRouter::default().with_probe_url("http://127.0.0.1:9/ip");
        assert!(!router.validate());
    }

    #[tokio::test]
    async fn async_validate_reports_unreachable() {
        let router = AnonymityRouter::default().with_probe_url("http://127.0.0.1:9/ip");
        assert!(!router.validate_async().await);
    }
}
