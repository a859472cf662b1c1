//! Job lifecycle notifications.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`] is the envelope published on it.
//!
//! Delivery is best-effort. Nothing in the dispatcher waits on a
//! subscriber or reacts to a dropped event.

pub mod bus;

pub use bus::{EventBus, JobEvent};
