//! Dispatch lifecycle events.
//!
//! The dispatcher reports every attempt, failure, retry and delivery through
//! an [`EventDispatcher`] handed to it at construction. Handlers decide what
//! to do with them; [`LoggingHandler`] forwards to the `log` facade.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AttemptEvent {
    pub slug: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub route: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DeliveredEvent {
    pub slug: String,
    pub attempt: u32,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub slug: String,
    pub attempt: u32,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub slug: String,
    pub attempt: u32,
    pub scheduled_after: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExhaustedEvent {
    pub slug: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CacheHitEvent {
    pub slug: String,
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Attempt(AttemptEvent),
    Delivered(DeliveredEvent),
    Failure(FailureEvent),
    Retry(RetryEvent),
    Exhausted(ExhaustedEvent),
    CacheHit(CacheHitEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &DispatchEvent);
}

/// Broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with the [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn dispatch(&self, event: DispatchEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Attempt(attempt) => {
                log::debug!(
                    "-> {} attempt {}/{} via {}",
                    attempt.slug,
                    attempt.attempt,
                    attempt.max_attempts,
                    attempt.route.as_deref().unwrap_or("direct")
                );
            }
            DispatchEvent::Delivered(done) => {
                log::info!(
                    "message delivered to {} on attempt {} ({:.2}s)",
                    done.slug,
                    done.attempt,
                    done.latency.as_secs_f64()
                );
            }
            DispatchEvent::Failure(failure) => {
                log::warn!(
                    "attempt {} for {} failed: {}",
                    failure.attempt,
                    failure.slug,
                    failure.reason
                );
            }
            DispatchEvent::Retry(retry) => {
                log::info!(
                    "retry {} attempt {} after {:.2}s",
                    retry.slug,
                    retry.attempt,
                    retry.scheduled_after.as_secs_f64()
                );
            }
            DispatchEvent::Exhausted(exhausted) => {
                log::error!(
                    "giving up on {} after {} attempts",
                    exhausted.slug,
                    exhausted.attempts
                );
            }
            DispatchEvent::CacheHit(hit) => {
                log::debug!("cache hit for {} ({})", hit.slug, hit.key);
            }
        }
    }
}
