//! Shared domain types for the vigia study-monitoring platform.
//!
//! Everything the alert engine, the notification framework, the storage
//! layer, and the HTTP server exchange lives here: severities, alert kinds
//! and payloads, hospital snapshots, dispatch outcomes, and run summaries.

pub mod id;
pub mod types;
