//! Threaded discussion and engagement state for a blog client.
//!
//! A [`ThreadStore`] holds one post with its comments and replies, applies
//! mutations optimistically and reconciles them against a [`SyncGateway`].

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

pub use app::error::{ThreadError, ThreadResult};
pub use app::thread_store::{StoreEvent, StoreState, ThreadStore};
pub use config::{ClientConfig, StoreLimits};
pub use infra::gateway::{GatewayError, SyncGateway};
