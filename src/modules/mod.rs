//! Cross-cutting services module
//!
//! The building blocks the dispatcher composes: user-agent rotation, proxy
//! routing, rate limiting, retries, caching, credentials and events.

pub mod auth;
pub mod cache;
pub mod events;
pub mod proxy;
pub mod rate_limit;
pub mod retry;
pub mod user_agents;

// Re-export commonly used types
pub use auth::{AuthError, AuthManager};
pub use cache::ResponseCache;
pub use events::{
    AttemptEvent, CacheHitEvent, DeliveredEvent, DispatchEvent, EventDispatcher, EventHandler,
    ExhaustedEvent, FailureEvent, LoggingHandler, RetryEvent,
};
pub use proxy::{ANONYMIZING_ENDPOINT, AnonymityRouter, PROBE_URL, ProxyRoute};
pub use rate_limit::{RateLimitError, RateLimitSnapshot, RateLimiter};
pub use retry::RetryPolicy;
pub use user_agents::{DEFAULT_USER_AGENTS, UserAgentError, UserAgentPool};
