//! Ledger store: persistence for lots, sales reports, line items and deliveries
//!
//! Every method is one atomic unit of work. Multi-row writes either land
//! completely or not at all, and status changes are compare-and-set on the
//! status the caller observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{
    Delivery, DeliveryStatus, InventoryLot, ReportPeriod, ReportStatus, SalesLineItem,
    SalesReport,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Filter for report listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub period: Option<ReportPeriod>,
    pub producer_id: Option<Uuid>,
}

/// Filter for delivery listings
#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub producer_id: Option<Uuid>,
    pub buyer_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
}

/// Filter for lot listings
#[derive(Debug, Clone, Default)]
pub struct LotFilter {
    pub producer_id: Option<Uuid>,
    pub available_only: bool,
}

/// Status fields written by an accepted review
#[derive(Debug, Clone)]
pub struct ReportReview {
    pub status: ReportStatus,
    pub reviewer_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

/// A delivery status change
#[derive(Debug, Clone)]
pub struct DeliveryTransition {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub cancellation_reason: Option<String>,
    /// Clear the lot claim in the same unit of work
    pub release_lot: bool,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> AppResult<()>;

    async fn insert_lot(&self, lot: &InventoryLot) -> AppResult<()>;

    async fn get_lot(&self, lot_id: Uuid) -> AppResult<Option<InventoryLot>>;

    async fn list_lots(&self, filter: &LotFilter) -> AppResult<Vec<InventoryLot>>;

    /// Insert a report and all its lines as one unit. A failure on any line
    /// leaves neither the report nor any line visible.
    async fn insert_report(&self, report: &SalesReport, lines: &[SalesLineItem]) -> AppResult<()>;

    async fn find_report_by_idempotency_key(
        &self,
        producer_id: Uuid,
        key: &str,
    ) -> AppResult<Option<SalesReport>>;

    async fn get_report(&self, report_id: Uuid) -> AppResult<Option<SalesReport>>;

    async fn report_lines(&self, report_id: Uuid) -> AppResult<Vec<SalesLineItem>>;

    /// Reports matching `filter`, oldest submission first
    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<SalesReport>>;

    /// Write review fields if the report is still in `expected`. Returns
    /// `None` when the report is missing or its status moved on.
    async fn apply_review(
        &self,
        report_id: Uuid,
        expected: ReportStatus,
        review: &ReportReview,
    ) -> AppResult<Option<SalesReport>>;

    /// Check the lot named by `delivery` exists, is unclaimed and holds at
    /// least the requested quantity; then insert the delivery and claim the
    /// lot. Fails with `LotNotFound`, `LotAlreadyClaimed` or
    /// `InsufficientQuantity`.
    async fn claim_lot_for_delivery(&self, delivery: &Delivery) -> AppResult<()>;

    async fn get_delivery(&self, delivery_id: Uuid) -> AppResult<Option<Delivery>>;

    /// Deliveries matching `filter`, newest first
    async fn list_deliveries(&self, filter: &DeliveryFilter) -> AppResult<Vec<Delivery>>;

    /// Overwrite the editable fields if the stored status is still
    /// `expected`, re-checking quantity against the lot. Returns `None` when
    /// the delivery is missing or its status moved on.
    async fn update_delivery(
        &self,
        delivery: &Delivery,
        expected: DeliveryStatus,
    ) -> AppResult<Option<Delivery>>;

    /// Move a delivery between statuses, optionally releasing its lot claim
    /// in the same unit. Returns `None` when the status moved on.
    async fn transition_delivery(
        &self,
        delivery_id: Uuid,
        transition: &DeliveryTransition,
    ) -> AppResult<Option<Delivery>>;

    /// Remove a delivery still in `expected` and release its lot claim.
    /// Returns `false` when nothing matched.
    async fn delete_delivery(&self, delivery_id: Uuid, expected: DeliveryStatus) -> AppResult<bool>;
}
