//! # Bounded-resource admission control.
//!
//! A [`ResourcePool`] owns a fixed capacity and a FIFO queue of pending
//! admission requests. Tasks call [`ResourcePool::acquire`] and either get a
//! [`Permit`] immediately or wait in arrival order until a holder releases.
//!
//! ## Architecture
//! ```text
//!  acquire(id) ──► PoolCmd::Acquire ──┐
//!                                     ▼
//!                          ┌────────────────────┐
//!  Permit::drop ──► Release│   pool actor       │──► oneshot ──► Permit
//!                          │  in_use / pending  │
//!                          │  (single consumer) │──► Bus events
//!                          └────────────────────┘
//! ```
//!
//! ## Rules
//! - All counter/queue mutation happens inside the actor task — the
//!   serialized domain. Grants are delivered through oneshot channels, so an
//!   admitted continuation never runs inline in the releaser's stack.
//! - Admission is strict FIFO; `acquire` is never rejected for capacity
//!   reasons. Cancelled or abandoned waiters are skipped at handoff time.
//! - A [`Permit`] releases exactly once: explicitly via
//!   [`Permit::release`] or implicitly on drop.

mod core;
mod permit;

pub use self::core::ResourcePool;
pub use self::permit::Permit;
