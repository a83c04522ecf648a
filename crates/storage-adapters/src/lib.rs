//! Storage adapters implementing the `domains` ports.
//!
//! The in-memory store is always available; PostgreSQL sits behind the
//! `db-postgres` feature.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
