//! The `NotificationService.run` handler
//!
//! Produces one greeting per request: `id` is always 1, `message` is
//! `"Hello, " + name`, and `timestamp` is the time the response was created.
//! The service keeps no state between calls.
//!
//! ```rust
//! use notifier_server::NotificationService;
//! use notifier_core::UserRequest;
//!
//! # async fn example() {
//! let resp = NotificationService::new().run(UserRequest::new("Ada")).await;
//! assert_eq!(resp.message, "Hello, Ada");
//! # }
//! ```

use crate::handler::{from_typed_fn, Handler};
use notifier_core::{NotificationResponse, ServiceDescriptor, UserRequest};
use std::time::Duration;

/// Greeting service registered under `NotificationService.run`
#[derive(Debug, Clone, Default)]
pub struct NotificationService {
    delay: Option<Duration>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each call
    ///
    /// Useful for exercising client timeouts and server drains.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Descriptor of this service served at `endpoint`
    pub fn descriptor(endpoint: impl Into<String>) -> ServiceDescriptor {
        ServiceDescriptor::notification(endpoint)
    }

    /// Build the greeting for `request`
    ///
    /// The timestamp is taken after any configured delay, so it reflects
    /// when the response was created.
    pub async fn run(&self, request: UserRequest) -> NotificationResponse {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        NotificationResponse::greeting(&request, chrono::Utc::now())
    }

    /// Adapt the service into a registration-table handler
    pub fn into_handler(self) -> Box<dyn Handler> {
        from_typed_fn(move |request: UserRequest| {
            let service = self.clone();
            async move { Ok(service.run(request).await) }
        })
    }
}
