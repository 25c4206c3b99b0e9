//! Relayq Database Layer
//!
//! This crate provides the [`RetryStore`] contract for the durable retry
//! queue, plus its two backends: [`PgRetryStore`] (PostgreSQL, the production
//! backend) and [`MemoryRetryStore`] (in-process, for tests and embedded
//! use).

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryRetryStore;
pub use postgres::PgRetryStore;
pub use store::RetryStore;
