//! # Composite orders: aggregate N staged tasks into one delivery.
//!
//! A [`CompositeOrder`] starts its constituent tasks concurrently (they
//! compete for the shared pool independently) and fires one completion
//! exactly once: when every task is ready, or as soon as the first task
//! fails.

mod core;

pub use self::core::{CompositeOrder, OrderReceipt, PartReceipt};
