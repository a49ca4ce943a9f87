//! Business logic services for the Fiber Trade Ledger

pub mod analytics;
pub mod delivery;
pub mod lot;
pub mod report;

pub use analytics::AnalyticsService;
pub use delivery::DeliveryService;
pub use lot::LotService;
pub use report::ReportService;
