//! Typed stub for the notification service

use crate::RpcClient;
use notifier_core::contract::{self, DescribeResult, RUN_METHOD};
use notifier_core::{Error, NotificationResponse, Result, ServiceDescriptor, UserRequest};

/// Calls `NotificationService.run` with contract types
#[derive(Clone)]
pub struct NotificationClient {
    client: RpcClient,
    descriptor: ServiceDescriptor,
}

impl NotificationClient {
    pub fn new(client: RpcClient) -> Self {
        let descriptor = ServiceDescriptor::notification(client.url());
        Self { client, descriptor }
    }

    /// Issue exactly one `run` call
    #[tracing::instrument(skip(self, request), fields(method = RUN_METHOD))]
    pub async fn run(&self, request: UserRequest) -> Result<NotificationResponse> {
        self.client.call(RUN_METHOD, request).await
    }

    /// Check that the server was built against the same wire contract
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the fingerprint or the method list differ
    ///   (a server without `rpc.describe` or with an unreadable description
    ///   counts as a mismatch)
    /// - `Error::Unavailable` if the server cannot be reached
    #[tracing::instrument(skip(self), fields(endpoint = %self.descriptor.endpoint))]
    pub async fn verify(&self) -> Result<DescribeResult> {
        let described = match self.client.describe().await {
            Err(Error::JsonRpc(data)) if data.code == -32601 => {
                return Err(Error::Config(format!(
                    "server at {} does not describe its contract",
                    self.descriptor.endpoint
                )))
            }
            Err(Error::InvalidResponse(reason)) => {
                return Err(Error::Config(format!(
                    "server at {} sent an unreadable contract description: {}",
                    self.descriptor.endpoint, reason
                )))
            }
            other => other?,
        };
        described.ensure_compatible()?;
        tracing::info!(fingerprint = %contract::fingerprint(), "Server contract verified");
        Ok(described)
    }

    /// The underlying JSON-RPC client
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }
}
