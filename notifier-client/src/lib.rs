//! WebSocket JSON-RPC client for the notification service
//!
//! # Core Features
//!
//! - **Lazy Channel**: nothing touches the network until the first call
//! - **Channel Reuse**: one WebSocket per target, shared by every call
//! - **Deadlines**: a connect deadline and a per-call timeout
//! - **Typed Stub**: [`NotificationClient`] speaks the wire contract types
//! - **Observability**: tracing spans per call, optional OpenTelemetry metrics
//!
//! There is no background reconnection and nothing is retried. After a
//! failure the next call simply tries to open a fresh channel.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use notifier_client::{ClientBuilder, NotificationClient};
//! use notifier_core::UserRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://127.0.0.1:50051").build();
//!     let notifications = NotificationClient::new(client);
//!
//!     let response = notifications.run(UserRequest::new("Ada")).await?;
//!     println!("{} at {}", response.message, response.timestamp);
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod metrics;
mod notification_client;
mod request;

pub use client::RpcClient;
pub use client_builder::ClientBuilder;
pub use connection_state::{ChannelState, ConnectionManager};
pub use metrics::{state_code, ClientMetrics};
pub use notification_client::NotificationClient;
