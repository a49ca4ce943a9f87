//! Domain models for the Fiber Trade Ledger

mod actor;
mod analytics;
mod delivery;
mod lot;
mod report;

pub use actor::*;
pub use analytics::*;
pub use delivery::*;
pub use lot::*;
pub use report::*;
