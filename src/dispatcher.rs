//! High level dispatch orchestration.
//!
//! Wires together user-agent rotation, proxy routing, rate limiting, retries,
//! response caching and classification behind two send operations: a
//! blocking one that absorbs failures and retries, and a single-shot async one
//! that reports every failure to the caller.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::modules::auth::AuthManager;
use crate::modules::cache::ResponseCache;
use crate::modules::events::{
	AttemptEvent, CacheHitEvent, DeliveredEvent, DispatchEvent, EventDispatcher, EventHandler,
	ExhaustedEvent, FailureEvent, RetryEvent,
};
use crate::modules::proxy::AnonymityRouter;
use crate::modules::rate_limit::{RateLimitError, RateLimiter};
use crate::modules::retry::RetryPolicy;
use crate::modules::user_agents::UserAgentPool;
use crate::protocol::classifier::{Classification, ResponseClassifier};
use crate::protocol::payload::{DeviceInfo, DispatchPayload};
use crate::protocol::status::{STATUS_URL, StatusProbe};
use crate::protocol::transport::{
	AsyncTransport, BlockingReqwestTransport, BlockingTransport, ReqwestTransport, TransportError,
	TransportRequest, TransportResponse,
};
use crate::utils::{UtilError, load_json_from_file};

/// Message endpoint of the remote service.
pub const MESSAGE_URL: &str = "https://api.scret.me/v1/message";
/// Default number of attempts for the blocking send.
pub const MAX_RETRIES: u32 = 3;
/// Upper bound on a single jittered pause between attempts.
const MAX_JITTER_SECS: f64 = 300.0;

/// Result alias used across the orchestration layer.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// High-level error surfaced by the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("network error: {0}")]
	Network(String),
	#[error("invalid response: {0}")]
	InvalidResponse(String),
	#[error("API error (status {status:?}): {message}")]
	Api {
		status: Option<u16>,
		message: String,
	},
	#[error("payload serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("url parse error: {0}")]
	Url(#[from] url::ParseError),
	#[error("header conversion failed: {0}")]
	InvalidHeader(String),
	#[error("rate limiter rejected configuration: {0}")]
	RateLimit(#[from] RateLimitError),
	#[error("configuration could not be loaded: {0}")]
	Config(#[from] UtilError),
}

impl From<TransportError> for DispatchError {
	fn from(err: TransportError) -> Self {
		DispatchError::Network(err.to_string())
	}
}

/// Pause inserted between failed blocking attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryDelay {
	/// `backoff_factor * 2^(attempt - 1)` seconds.
	#[default]
	Exponential,
	/// Uniform in `[min_secs, max_secs)`, independent of the attempt number.
	Jitter { min_secs: f64, max_secs: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
	pub max_requests: u32,
	pub period_secs: f64,
}

/// Dispatcher configuration used by the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
	pub endpoint: String,
	pub status_url: String,
	pub retries: u32,
	pub backoff_factor: f64,
	pub retry_delay: RetryDelay,
	pub timeout_secs: Option<f64>,
	pub proxy: Option<String>,
	pub use_anonymizing: bool,
	pub rate_limit: Option<RateLimitSettings>,
	pub cache_responses: bool,
	pub api_key: Option<String>,
	pub user_agent: Option<String>,
	pub device: DeviceInfo,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			endpoint: MESSAGE_URL.to_string(),
			status_url: STATUS_URL.to_string(),
			retries: MAX_RETRIES,
			backoff_factor: 1.0,
			retry_delay: RetryDelay::default(),
			timeout_secs: None,
			proxy: None,
			use_anonymizing: false,
			rate_limit: None,
			cache_responses: false,
			api_key: None,
			user_agent: None,
			device: DeviceInfo::default(),
		}
	}
}

impl DispatcherConfig {
	/// Loads a configuration document; missing fields take their defaults.
	pub fn from_json_file(path: impl AsRef<Path>) -> DispatchResult<Self> {
		let document = load_json_from_file(path)?;
		Ok(serde_json::from_value(document)?)
	}

	pub fn from_json_str(raw: &str) -> DispatchResult<Self> {
		Ok(serde_json::from_str(raw)?)
	}
}

/// Fluent builder for [`MessageDispatcher`].
pub struct DispatcherBuilder {
	slug: String,
	content: String,
	config: DispatcherConfig,
	user_agents: Option<UserAgentPool>,
	rate_limiter: Option<Arc<RateLimiter>>,
	blocking_transport: Option<Arc<dyn BlockingTransport>>,
	async_transport: Option<Arc<dyn AsyncTransport>>,
	events: EventDispatcher,
}

impl DispatcherBuilder {
	pub fn new(slug: impl Into<String>, content: impl Into<String>) -> Self {
		Self {
			slug: slug.into(),
			content: content.into(),
			config: DispatcherConfig::default(),
			user_agents: None,
			rate_limiter: None,
			blocking_transport: None,
			async_transport: None,
			events: EventDispatcher::with_logging(),
		}
	}

	pub fn with_config(mut self, config: DispatcherConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_retries(mut self, retries: u32) -> Self {
		self.config.retries = retries.max(1);
		self
	}

	pub fn with_backoff_factor(mut self, factor: f64) -> Self {
		self.config.backoff_factor = factor;
		self
	}

	pub fn with_retry_delay(mut self, delay: RetryDelay) -> Self {
		self.config.retry_delay = delay;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.config.timeout_secs = Some(timeout.as_secs_f64());
		self
	}

	pub fn with_proxy(mut self, endpoint: impl Into<String>) -> Self {
		self.config.proxy = Some(endpoint.into());
		self
	}

	pub fn with_anonymizing(mut self, enabled: bool) -> Self {
		self.config.use_anonymizing = enabled;
		self
	}

	/// Limiter owned by this dispatcher alone.
	pub fn with_rate_limit(mut self, max_requests: u32, period: Duration) -> Self {
		self.config.rate_limit = Some(RateLimitSettings {
			max_requests,
			period_secs: period.as_secs_f64(),
		});
		self
	}

	/// Limiter shared with other dispatchers. Takes precedence over
	/// [`DispatcherBuilder::with_rate_limit`].
	pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.rate_limiter = Some(limiter);
		self
	}

	pub fn with_cache(mut self, enabled: bool) -> Self {
		self.config.cache_responses = enabled;
		self
	}

	pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
		self.config.api_key = Some(key.into());
		self
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.config.user_agent = Some(user_agent.into());
		self
	}

	pub fn with_user_agent_pool(mut self, pool: UserAgentPool) -> Self {
		self.user_agents = Some(pool);
		self
	}

	pub fn with_device(mut self, device: DeviceInfo) -> Self {
		self.config.device = device;
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.events.register_handler(handler);
		self
	}

	/// Replaces the event dispatcher, including the default logging handler.
	pub fn with_events(mut self, events: EventDispatcher) -> Self {
		self.events = events;
		self
	}

	pub fn with_blocking_transport(mut self, transport: Arc<dyn BlockingTransport>) -> Self {
		self.blocking_transport = Some(transport);
		self
	}

	pub fn with_async_transport(mut self, transport: Arc<dyn AsyncTransport>) -> Self {
		self.async_transport = Some(transport);
		self
	}

	pub fn build(self) -> DispatchResult<MessageDispatcher> {
		MessageDispatcher::with_builder(self)
	}
}

/// Dispatcher for one outgoing message.
pub struct MessageDispatcher {
	config: DispatcherConfig,
	endpoint: Url,
	status_url: Url,
	payload: DispatchPayload,
	user_agents: UserAgentPool,
	router: AnonymityRouter,
	auth: AuthManager,
	rate_limiter: Option<Arc<RateLimiter>>,
	retry: RetryPolicy,
	cache: ResponseCache,
	timeout: Option<Duration>,
	blocking_transport: Arc<dyn BlockingTransport>,
	async_transport: Arc<dyn AsyncTransport>,
	events: Arc<EventDispatcher>,
}

impl MessageDispatcher {
	/// Construct a dispatcher with default configuration and `retries` attempts.
	pub fn new(
		slug: impl Into<String>,
		content: impl Into<String>,
		retries: u32,
	) -> DispatchResult<Self> {
		DispatcherBuilder::new(slug, content).with_retries(retries).build()
	}

	/// Obtain a builder to customise the dispatcher instance.
	pub fn builder(slug: impl Into<String>, content: impl Into<String>) -> DispatcherBuilder {
		DispatcherBuilder::new(slug, content)
	}

	fn with_builder(builder: DispatcherBuilder) -> DispatchResult<Self> {
		let DispatcherBuilder {
			slug,
			content,
			config,
			user_agents,
			rate_limiter,
			blocking_transport,
			async_transport,
			events,
		} = builder;

		let endpoint = Url::parse(&config.endpoint)?;
		let status_url = Url::parse(&config.status_url)?;

		let mut user_agents = user_agents.unwrap_or_default();
		if let Some(ref custom) = config.user_agent {
			user_agents.set(custom.clone());
		}

		let mut device = config.device.clone();
		if device.user_agent.is_empty() {
			device.user_agent = user_agents.current().to_string();
		}
		let payload = DispatchPayload::new(slug, content, &device)?;

		let rate_limiter = match (rate_limiter, config.rate_limit) {
			(Some(shared), _) => Some(shared),
			(None, Some(settings)) => {
				let period = secs(settings.period_secs)
					.ok_or(RateLimitError::InvalidBounds("period must be positive"))?;
				Some(Arc::new(RateLimiter::new(settings.max_requests, period)?))
			}
			(None, None) => None,
		};

		Ok(Self {
			endpoint,
			status_url,
			payload,
			user_agents,
			router: AnonymityRouter::new(config.proxy.clone(), config.use_anonymizing),
			auth: AuthManager::new(config.api_key.clone()),
			rate_limiter,
			retry: RetryPolicy::new(config.retries, config.backoff_factor),
			cache: ResponseCache::new(),
			timeout: config.timeout_secs.and_then(secs),
			blocking_transport: blocking_transport
				.unwrap_or_else(|| Arc::new(BlockingReqwestTransport::new())),
			async_transport: async_transport.unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
			events: Arc::new(events),
			config,
		})
	}

	/// Sends the payload from the calling thread, retrying per the retry
	/// policy. Failures are logged and absorbed; `None` means every attempt
	/// failed.
	///
	/// Uses the blocking transport, so it must not run inside an async runtime.
	pub fn send_blocking(&self) -> Option<Value> {
		let cache_key = self.cache_key();
		if let Some(hit) = self.cached(cache_key.as_deref()) {
			return Some(hit);
		}

		let outcome = self.retry.execute_with(
			|attempt| self.attempt_blocking(attempt),
			|attempt, backoff| {
				let delay = self.inter_attempt_delay(backoff);
				self.events.dispatch(DispatchEvent::Retry(RetryEvent {
					slug: self.payload.target_slug().to_string(),
					attempt: attempt + 1,
					scheduled_after: delay,
					timestamp: chrono::Utc::now(),
				}));
				std::thread::sleep(delay);
			},
		);

		match outcome {
			Ok(body) => {
				if let Some(key) = cache_key {
					self.cache.put(key, body.clone());
				}
				Some(body)
			}
			Err(_) => {
				self.events.dispatch(DispatchEvent::Exhausted(ExhaustedEvent {
					slug: self.payload.target_slug().to_string(),
					attempts: self.retry.max_attempts(),
					timestamp: chrono::Utc::now(),
				}));
				None
			}
		}
	}

	/// Sends the payload once over the async transport.
	///
	/// Returns `Ok(None)` when the API answered but rejected the message.
	pub async fn send_async(&self) -> DispatchResult<Option<Value>> {
		let cache_key = self.cache_key();
		if let Some(hit) = self.cached(cache_key.as_deref()) {
			return Ok(Some(hit));
		}

		if let Some(ref limiter) = self.rate_limiter {
			limiter.acquire().await;
		}

		self.report_attempt_start(1, 1);
		let started = Instant::now();
		let result = self.attempt_async().await;

		match &result {
			Ok(Some(body)) => {
				self.report_delivered(1, started.elapsed());
				if let Some(key) = cache_key {
					self.cache.put(key, body.clone());
				}
			}
			Ok(None) => self.report_failure(1, "message rejected by API".to_string()),
			Err(err) => self.report_failure(1, err.to_string()),
		}

		result
	}

	/// Queries the service status endpoint through the current route.
	pub fn check_status(&self) -> String {
		StatusProbe::new(self.status_url.clone())
			.with_timeout(self.timeout)
			.check(self.blocking_transport.as_ref(), &self.router.effective_route())
	}

	pub async fn check_status_async(&self) -> String {
		StatusProbe::new(self.status_url.clone())
			.with_timeout(self.timeout)
			.check_async(self.async_transport.as_ref(), &self.router.effective_route())
			.await
	}

	/// Replaces the serialized device record wholesale.
	pub fn set_custom_device<T: Serialize + ?Sized>(&mut self, device: &T) -> DispatchResult<()> {
		self.payload.set_device(device)?;
		Ok(())
	}

	pub fn add_annotation(&mut self, text: impl Into<String>) {
		self.payload.add_annotation(text);
	}

	pub fn clear_annotations(&mut self) {
		self.payload.clear_annotations();
	}

	pub fn payload(&self) -> &DispatchPayload {
		&self.payload
	}

	pub fn set_custom_user_agent(&mut self, user_agent: impl Into<String>) {
		self.user_agents.set(user_agent);
	}

	pub fn set_random_user_agent(&mut self) {
		self.user_agents.reset_to_random();
	}

	pub fn user_agent(&self) -> &str {
		self.user_agents.current()
	}

	pub fn user_agents(&self) -> &UserAgentPool {
		&self.user_agents
	}

	/// Applied to every network call of both send paths.
	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = Some(timeout);
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	pub fn router(&self) -> &AnonymityRouter {
		&self.router
	}

	pub fn router_mut(&mut self) -> &mut AnonymityRouter {
		&mut self.router
	}

	pub fn auth(&self) -> &AuthManager {
		&self.auth
	}

	pub fn auth_mut(&mut self) -> &mut AuthManager {
		&mut self.auth
	}

	pub fn cache(&self) -> &ResponseCache {
		&self.cache
	}

	pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
		self.rate_limiter.as_ref()
	}

	pub fn set_rate_limiter(&mut self, limiter: Option<Arc<RateLimiter>>) {
		self.rate_limiter = limiter;
	}

	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	pub fn config(&self) -> &DispatcherConfig {
		&self.config
	}

	fn attempt_blocking(&self, attempt: u32) -> DispatchResult<Value> {
		if let Some(ref limiter) = self.rate_limiter {
			limiter.acquire_blocking();
		}

		self.report_attempt_start(attempt, self.retry.max_attempts());
		let started = Instant::now();
		let result = self.message_request().and_then(|request| {
			let response = self.blocking_transport.send(&request)?;
			accept_response(response)
		});

		match &result {
			Ok(_) => self.report_delivered(attempt, started.elapsed()),
			Err(err) => self.report_failure(attempt, err.to_string()),
		}
		result
	}

	async fn attempt_async(&self) -> DispatchResult<Option<Value>> {
		let request = self.message_request().map_err(|err| DispatchError::Api {
			status: None,
			message: err.to_string(),
		})?;

		let response = self.async_transport.send(&request).await?;
		if !response.is_success() {
			return Err(DispatchError::Api {
				status: Some(response.status),
				message: format!("HTTP status {}", response.status),
			});
		}

		let body: Value = serde_json::from_slice(&response.body)
			.map_err(|err| DispatchError::InvalidResponse(err.to_string()))?;
		Ok(ResponseClassifier::classify_value(body).into_body())
	}

	fn message_request(&self) -> DispatchResult<TransportRequest> {
		let body = self.payload.to_json_bytes()?;
		Ok(
			TransportRequest::new(
				Method::POST,
				self.endpoint.clone(),
				self.router.effective_route(),
			)
			.with_headers(self.request_headers()?)
			.with_body(body)
			.with_timeout(self.timeout),
		)
	}

	fn request_headers(&self) -> DispatchResult<HeaderMap> {
		let mut headers = default_headers();
		let user_agent = HeaderValue::from_str(self.user_agents.current())
			.map_err(|_| DispatchError::InvalidHeader("user-agent".into()))?;
		headers.insert(USER_AGENT, user_agent);

		if self.auth.is_set() {
			let auth = self
				.auth
				.header()
				.map_err(|err| DispatchError::InvalidHeader(err.to_string()))?;
			headers.extend(auth);
		}
		Ok(headers)
	}

	fn inter_attempt_delay(&self, backoff: Duration) -> Duration {
		match self.config.retry_delay {
			RetryDelay::Exponential => backoff,
			RetryDelay::Jitter { min_secs, max_secs } => {
				if !(min_secs.is_finite() && max_secs.is_finite()) {
					return Duration::ZERO;
				}
				let min_secs = min_secs.clamp(0.0, MAX_JITTER_SECS);
				let max_secs = max_secs.clamp(0.0, MAX_JITTER_SECS);
				let secs_value = if max_secs > min_secs {
					rand::thread_rng().gen_range(min_secs..max_secs)
				} else {
					min_secs
				};
				secs(secs_value).unwrap_or(Duration::ZERO)
			}
		}
	}

	fn cache_key(&self) -> Option<String> {
		self.config
			.cache_responses
			.then(|| self.payload.cache_key())
	}

	fn cached(&self, key: Option<&str>) -> Option<Value> {
		let key = key?;
		let hit = self.cache.get(key)?;
		self.events.dispatch(DispatchEvent::CacheHit(CacheHitEvent {
			slug: self.payload.target_slug().to_string(),
			key: key.to_string(),
			timestamp: chrono::Utc::now(),
		}));
		Some(hit)
	}

	fn report_attempt_start(&self, attempt: u32, max_attempts: u32) {
		self.events.dispatch(DispatchEvent::Attempt(AttemptEvent {
			slug: self.payload.target_slug().to_string(),
			attempt,
			max_attempts,
			route: self.router.effective_route().endpoint().map(str::to_string),
			timestamp: chrono::Utc::now(),
		}));
	}

	fn report_delivered(&self, attempt: u32, latency: Duration) {
		self.events.dispatch(DispatchEvent::Delivered(DeliveredEvent {
			slug: self.payload.target_slug().to_string(),
			attempt,
			latency,
			timestamp: chrono::Utc::now(),
		}));
	}

	fn report_failure(&self, attempt: u32, reason: String) {
		self.events.dispatch(DispatchEvent::Failure(FailureEvent {
			slug: self.payload.target_slug().to_string(),
			attempt,
			reason,
			timestamp: chrono::Utc::now(),
		}));
	}
}

/// Success status plus an accepted body, or the reason the attempt failed.
///
/// A non-2xx status is an invalid response even when the body carries a
/// truthy `isValid`, so the attempt is retried like any other invalid reply.
fn accept_response(response: TransportResponse) -> DispatchResult<Value> {
	let status = response.status;
	match ResponseClassifier::classify_bytes(&response.body) {
		Classification::Accepted(body) if response.is_success() => Ok(body),
		Classification::Accepted(_) => Err(DispatchError::InvalidResponse(format!(
			"HTTP status {status}"
		))),
		other => Err(DispatchError::InvalidResponse(format!(
			"HTTP status {status}: {}",
			other.failure_reason().unwrap_or_default()
		))),
	}
}

fn default_headers() -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
	headers.insert(
		ACCEPT_LANGUAGE,
		HeaderValue::from_static("en-US,en;q=0.9,pt;q=0.8"),
	);
	headers.insert(REFERER, HeaderValue::from_static("https://scret.me/"));
	for (name, value) in [
		("referrer-policy", "strict-origin-when-cross-origin"),
		("sec-ch-ua-mobile", "?0"),
		("sec-ch-ua-platform", "\"Windows\""),
		("sec-fetch-dest", "empty"),
		("sec-fetch-mode", "cors"),
		("sec-fetch-site", "same-site"),
	] {
		headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
	}
	headers
}

fn secs(value: f64) -> Option<Duration> {
	Duration::try_from_secs_f64(value)
		.ok()
		.filter(|duration| !duration.is_zero())
}
