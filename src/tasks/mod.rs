//! Background Tasks Module
//!
//! Contains the expiry scheduler and the chain of pending expirations it owns.
//!
//! # Tasks
//! - Expiry Scheduler: keeps the chain sorted and reclaims expired entries
//!   when the head of the chain falls due

mod chain;
mod scheduler;

pub use chain::{ExpiryChain, SweepReport};
pub(crate) use scheduler::{ScheduleExpiry, Scheduler, SchedulerContext, SchedulerHandle};
