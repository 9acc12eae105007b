//! Listener layer — per-document snapshot subscriptions with the
//! local-then-remote ordering contract.
//!
//! # Modules
//!
//! - [`event`] — [`ViewEvent`] and [`EventOrigin`].
//! - [`multiplexer`] — [`ListenerMultiplexer`] and [`Unsubscribe`].

pub mod event;
pub mod multiplexer;

pub use event::{EventOrigin, ViewEvent};
pub use multiplexer::{ListenerMultiplexer, Unsubscribe};
