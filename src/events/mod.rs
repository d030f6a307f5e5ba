//! # Runtime events and the broadcast bus.
//!
//! Every state change worth observing (admission, task lifecycle, order
//! delivery, shutdown progress) is published as an [`Event`] on the [`Bus`].
//! Subscribers consume them through the `SubscriberSet` fan-out.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
