//! Persistence layer for the vigia alert and notification pipeline.
//!
//! [`store::Store`] is the unified async access layer over SeaORM + SQLite.
//! Schema migrations run automatically on connect (see the `migration`
//! crate); the partial unique index on `alerts` is the storage-level
//! backstop for the one-unresolved-alert-per-dedup-key invariant.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use store::Store;
