//! # scret-rs
//!
//! A resilient dispatch client for the scret.me messaging API.
//!
//! Each send picks a user agent, resolves the proxy route (direct, custom or
//! the local Tor SOCKS endpoint), waits for a rate-limit slot, attaches the
//! bearer credential when one is set, and classifies the response. The
//! blocking path retries with exponential backoff; the async path makes a
//! single attempt and reports typed errors.
//!
//! ## Features
//!
//! - Blocking and async send paths over reqwest
//! - User-Agent rotation with custom overrides
//! - Custom proxy or anonymizing-network routing with reachability probes
//! - Sliding-window rate limiting shareable across dispatchers
//! - Generic exponential-backoff retry executor
//! - In-memory response cache
//! - Pluggable event handlers for logging and observation
//!
//! ## Example
//!
//! ```no_run
//! use scret_rs::MessageDispatcher;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dispatcher = MessageDispatcher::new("someone", "hello there", 3)?;
//!     dispatcher.add_annotation("sent from scret-rs");
//!     match dispatcher.send_blocking() {
//!         Some(body) => println!("delivered: {body}"),
//!         None => println!("delivery failed"),
//!     }
//!     Ok(())
//! }
//! ```

mod dispatcher;

pub mod modules;
pub mod protocol;
pub mod utils;

pub use crate::dispatcher::{
    DispatchError,
    DispatchResult,
    DispatcherBuilder,
    DispatcherConfig,
    MAX_RETRIES,
    MESSAGE_URL,
    MessageDispatcher,
    RateLimitSettings,
    RetryDelay,
};

pub use crate::modules::{
    ANONYMIZING_ENDPOINT,
    AnonymityRouter,
    AttemptEvent,
    AuthError,
    AuthManager,
    CacheHitEvent,
    DEFAULT_USER_AGENTS,
    DeliveredEvent,
    DispatchEvent,
    EventDispatcher,
    EventHandler,
    ExhaustedEvent,
    FailureEvent,
    LoggingHandler,
    PROBE_URL,
    ProxyRoute,
    RateLimitError,
    RateLimitSnapshot,
    RateLimiter,
    ResponseCache,
    RetryEvent,
    RetryPolicy,
    UserAgentError,
    UserAgentPool,
};

pub use crate::protocol::{
    AsyncTransport,
    BlockingReqwestTransport,
    BlockingTransport,
    Classification,
    DeviceInfo,
    DispatchPayload,
    ReqwestTransport,
    ResponseClassifier,
    STATUS_CONNECTION_ERROR,
    STATUS_OFFLINE,
    STATUS_UNKNOWN,
    STATUS_URL,
    StatusProbe,
    TransportError,
    TransportRequest,
    TransportResponse,
    interpret_status,
};

pub use crate::utils::{
    UtilError,
    format_device_data,
    load_json_from_file,
    pretty_print_json,
    save_json_to_file,
    validate_ip,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
