//! Request translation and error mapping
//!
//! The gateway turns one HTTP query into exactly one `run` call and maps
//! the outcome onto an HTTP status:
//!
//! | Outcome | Status |
//! |---|---|
//! | greeting | 200 |
//! | missing `name` (no call issued) | 400 |
//! | `Error::Unavailable` | 503 |
//! | `Error::Timeout` | 504 |
//! | anything else | 500 |
//!
//! Nothing is retried.

use async_trait::async_trait;
use notifier_client::NotificationClient;
use notifier_core::{Error, NotificationResponse, Result, UserRequest};
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;

/// The one RPC the gateway depends on
///
/// Implemented by [`NotificationClient`]; tests substitute their own.
#[async_trait]
pub trait NotificationCaller: Send + Sync {
    async fn run(&self, request: UserRequest) -> Result<NotificationResponse>;
}

#[async_trait]
impl NotificationCaller for NotificationClient {
    async fn run(&self, request: UserRequest) -> Result<NotificationResponse> {
        NotificationClient::run(self, request).await
    }
}

/// Query string of `GET /notification`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub name: Option<String>,
}

impl NotificationQuery {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Failure of one gateway request, as the HTTP caller sees it
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    CallerInput(String),

    #[error("notification service unavailable: {0}")]
    Unavailable(String),

    #[error("notification service did not answer in time")]
    Timeout,

    #[error("notification call failed: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::CallerInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for GatewayError {
    fn from(error: Error) -> Self {
        match error {
            Error::Unavailable(reason) => GatewayError::Unavailable(reason),
            Error::Timeout => GatewayError::Timeout,
            Error::CallerInput(reason) => GatewayError::CallerInput(reason),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// HTTP-facing adapter in front of a [`NotificationCaller`]
#[derive(Clone)]
pub struct Gateway {
    caller: Arc<dyn NotificationCaller>,
}

impl Gateway {
    pub fn new(caller: impl NotificationCaller + 'static) -> Self {
        Self {
            caller: Arc::new(caller),
        }
    }

    pub fn from_arc(caller: Arc<dyn NotificationCaller>) -> Self {
        Self { caller }
    }

    /// Validate the query and relay exactly one `run` call
    #[tracing::instrument(skip(self), name = "gateway.notification")]
    pub async fn handle(
        &self,
        query: NotificationQuery,
    ) -> std::result::Result<NotificationResponse, GatewayError> {
        let name = query.name.ok_or_else(|| {
            GatewayError::CallerInput("missing required query parameter `name`".to_string())
        })?;

        match self.caller.run(UserRequest::new(name)).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let mapped = GatewayError::from(e);
                match &mapped {
                    GatewayError::Internal(_) => {
                        tracing::error!(error = %mapped, "Notification call failed")
                    }
                    _ => tracing::warn!(error = %mapped, "Notification call failed"),
                }
                Err(mapped)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use notifier_core::JsonRpcErrorData;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Caller that returns a canned outcome and counts invocations
    pub(crate) struct MockCaller {
        pub(crate) calls: AtomicUsize,
        outcome: Mutex<Option<Error>>,
    }

    impl MockCaller {
        pub(crate) fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Mutex::new(None),
            })
        }

        pub(crate) fn failing(error: Error) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Mutex::new(Some(error)),
            })
        }
    }

    #[async_trait]
    impl NotificationCaller for MockCaller {
        async fn run(&self, request: UserRequest) -> Result<NotificationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome.lock().unwrap().clone() {
                Some(error) => Err(error),
                None => Ok(NotificationResponse::greeting(
                    &request,
                    chrono::Utc::now(),
                )),
            }
        }
    }

    async fn status_for(error: Error) -> StatusCode {
        let caller = MockCaller::failing(error);
        let gateway = Gateway::from_arc(caller.clone());
        let err = gateway
            .handle(NotificationQuery::named("Ada"))
            .await
            .unwrap_err();
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
        err.status()
    }

    #[tokio::test]
    async fn test_relays_greeting() {
        let caller = MockCaller::ok();
        let gateway = Gateway::from_arc(caller.clone());

        let response = gateway.handle(NotificationQuery::named("Ada")).await.unwrap();
        assert_eq!(response.message, "Hello, Ada");
        assert_eq!(response.id, 1);
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_name_issues_no_call() {
        let caller = MockCaller::ok();
        let gateway = Gateway::from_arc(caller.clone());

        let err = gateway.handle(NotificationQuery::default()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(caller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_name_is_still_a_name() {
        let caller = MockCaller::ok();
        let gateway = Gateway::from_arc(caller.clone());

        let response = gateway.handle(NotificationQuery::named("")).await.unwrap();
        assert_eq!(response.message, "Hello, ");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(
            status_for(Error::Unavailable("down".into())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(Error::Timeout).await, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(Error::InvalidResponse("skew".into())).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(Error::JsonRpc(JsonRpcErrorData::internal_error("boom"))).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(Error::Cancelled("stopping".into())).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
