//! Shared types and models for the Fiber Trade Ledger
//!
//! This crate contains the domain model, input validation and the pure
//! workflow/aggregation rules used by the backend. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;
pub mod workflow;

pub use models::*;
pub use types::*;
pub use validation::*;
pub use workflow::*;
