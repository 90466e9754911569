//! Fabula notification infrastructure.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`; the default `NotificationSink`.
//! - [`PipelineEvent`] — the canonical lifecycle event envelope.
//! - [`SubscriberRegistry`] — per-transport subscription registry with
//!   channel filtering, fed by [`registry::forward`].

pub mod bus;
pub mod registry;

pub use bus::{EventBus, PipelineEvent};
pub use registry::{SubscriberRegistry, SubscriberSender};
