//! In-process ledger store
//!
//! Each call takes the table lock for its whole unit of work and checks every
//! row against the same constraints the SQL schema enforces before applying
//! anything, so a rejected write leaves the tables untouched.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    Delivery, DeliveryStatus, InventoryLot, ReportStatus, SalesLineItem, SalesReport,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    DeliveryFilter, DeliveryTransition, LedgerStore, LotFilter, ReportFilter, ReportReview,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    lots: Vec<InventoryLot>,
    reports: Vec<SalesReport>,
    lines: Vec<SalesLineItem>,
    deliveries: Vec<Delivery>,
}

/// Ledger store kept in process memory
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_report(report: &SalesReport) -> Result<(), String> {
    if report.transaction_count <= 0 {
        return Err("transaction_count must be positive".to_string());
    }
    if report.total_revenue < Decimal::ZERO || report.total_quantity < Decimal::ZERO {
        return Err("report totals must not be negative".to_string());
    }
    Ok(())
}

fn check_line(line: &SalesLineItem, report_id: Uuid) -> Result<(), String> {
    if line.report_id != report_id {
        return Err(format!("line {} references another report", line.id));
    }
    if line.quantity <= Decimal::ZERO {
        return Err("quantity must be positive".to_string());
    }
    if line.unit_price < Decimal::ZERO || line.total_amount < Decimal::ZERO {
        return Err("amounts must not be negative".to_string());
    }
    Ok(())
}

fn copy_editable(target: &mut Delivery, source: &Delivery) {
    target.scheduled_date = source.scheduled_date;
    target.scheduled_time = source.scheduled_time;
    target.quantity_kg = source.quantity_kg;
    target.unit_price = source.unit_price;
    target.total_amount = source.total_amount;
    target.pickup_location = source.pickup_location.clone();
    target.dropoff_location = source.dropoff_location.clone();
    target.producer_contact = source.producer_contact.clone();
    target.buyer_contact = source.buyer_contact.clone();
    target.delivery_method = source.delivery_method;
    target.payment_status = source.payment_status;
    target.payment_method = source.payment_method;
    target.notes = source.notes.clone();
    target.updated_at = source.updated_at;
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert_lot(&self, lot: &InventoryLot) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.lots.iter().any(|l| l.id == lot.id) {
            return Err(AppError::DuplicateEntry("lot id".to_string()));
        }
        if lot.quantity_kg < Decimal::ZERO {
            return Err(AppError::Persistence(
                "lot quantity must not be negative".to_string(),
            ));
        }
        tables.lots.push(lot.clone());
        Ok(())
    }

    async fn get_lot(&self, lot_id: Uuid) -> AppResult<Option<InventoryLot>> {
        let tables = self.tables.read().await;
        Ok(tables.lots.iter().find(|l| l.id == lot_id).cloned())
    }

    async fn list_lots(&self, filter: &LotFilter) -> AppResult<Vec<InventoryLot>> {
        let tables = self.tables.read().await;
        let mut lots: Vec<_> = tables
            .lots
            .iter()
            .filter(|l| filter.producer_id.map_or(true, |p| l.producer_id == p))
            .filter(|l| !filter.available_only || l.is_available())
            .cloned()
            .collect();
        lots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lots)
    }

    async fn insert_report(&self, report: &SalesReport, lines: &[SalesLineItem]) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        if tables.reports.iter().any(|r| r.id == report.id) {
            return Err(AppError::DuplicateEntry("report id".to_string()));
        }
        if let Some(key) = report.idempotency_key.as_deref() {
            let taken = tables.reports.iter().any(|r| {
                r.producer_id == report.producer_id && r.idempotency_key.as_deref() == Some(key)
            });
            if taken {
                return Err(AppError::DuplicateEntry("idempotency_key".to_string()));
            }
        }
        check_report(report).map_err(|e| AppError::Persistence(format!("report: {}", e)))?;

        for (i, line) in lines.iter().enumerate() {
            let duplicate = tables.lines.iter().any(|l| l.id == line.id)
                || lines[..i].iter().any(|l| l.id == line.id);
            if duplicate {
                return Err(AppError::Persistence(format!(
                    "line item {} of {}: duplicate id",
                    i + 1,
                    lines.len()
                )));
            }
            check_line(line, report.id).map_err(|e| {
                AppError::Persistence(format!("line item {} of {}: {}", i + 1, lines.len(), e))
            })?;
        }

        tables.reports.push(report.clone());
        tables.lines.extend_from_slice(lines);
        Ok(())
    }

    async fn find_report_by_idempotency_key(
        &self,
        producer_id: Uuid,
        key: &str,
    ) -> AppResult<Option<SalesReport>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .find(|r| r.producer_id == producer_id && r.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn get_report(&self, report_id: Uuid) -> AppResult<Option<SalesReport>> {
        let tables = self.tables.read().await;
        Ok(tables.reports.iter().find(|r| r.id == report_id).cloned())
    }

    async fn report_lines(&self, report_id: Uuid) -> AppResult<Vec<SalesLineItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .lines
            .iter()
            .filter(|l| l.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<SalesReport>> {
        let tables = self.tables.read().await;
        let mut reports: Vec<_> = tables
            .reports
            .iter()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.period.map_or(true, |p| r.period == p))
            .filter(|r| filter.producer_id.map_or(true, |p| r.producer_id == p))
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(reports)
    }

    async fn apply_review(
        &self,
        report_id: Uuid,
        expected: ReportStatus,
        review: &ReportReview,
    ) -> AppResult<Option<SalesReport>> {
        let mut tables = self.tables.write().await;
        let Some(report) = tables
            .reports
            .iter_mut()
            .find(|r| r.id == report_id && r.status == expected)
        else {
            return Ok(None);
        };

        report.status = review.status;
        report.reviewed_by = Some(review.reviewer_id);
        report.reviewed_at = Some(review.reviewed_at);
        report.rejection_reason = review.rejection_reason.clone();
        Ok(Some(report.clone()))
    }

    async fn claim_lot_for_delivery(&self, delivery: &Delivery) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        if tables.deliveries.iter().any(|d| d.id == delivery.id) {
            return Err(AppError::DuplicateEntry("delivery id".to_string()));
        }
        let lot_index = tables
            .lots
            .iter()
            .position(|l| l.id == delivery.lot_id)
            .ok_or(AppError::LotNotFound(delivery.lot_id))?;

        let lot = &tables.lots[lot_index];
        if !lot.is_available() {
            return Err(AppError::LotAlreadyClaimed(lot.id));
        }
        if delivery.quantity_kg > lot.quantity_kg {
            return Err(AppError::InsufficientQuantity {
                requested: delivery.quantity_kg,
                available: lot.quantity_kg,
            });
        }

        tables.deliveries.push(delivery.clone());
        tables.lots[lot_index].claimed_by = Some(delivery.id);
        Ok(())
    }

    async fn get_delivery(&self, delivery_id: Uuid) -> AppResult<Option<Delivery>> {
        let tables = self.tables.read().await;
        Ok(tables.deliveries.iter().find(|d| d.id == delivery_id).cloned())
    }

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> AppResult<Vec<Delivery>> {
        let tables = self.tables.read().await;
        let mut deliveries: Vec<_> = tables
            .deliveries
            .iter()
            .filter(|d| filter.producer_id.map_or(true, |p| d.producer_id == p))
            .filter(|d| filter.buyer_id.map_or(true, |b| d.buyer_id == b))
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deliveries)
    }

    async fn update_delivery(
        &self,
        delivery: &Delivery,
        expected: DeliveryStatus,
    ) -> AppResult<Option<Delivery>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables
            .deliveries
            .iter()
            .position(|d| d.id == delivery.id && d.status == expected)
        else {
            return Ok(None);
        };

        let lot_id = tables.deliveries[index].lot_id;
        let on_hand = tables
            .lots
            .iter()
            .find(|l| l.id == lot_id)
            .map(|l| l.quantity_kg)
            .ok_or(AppError::LotNotFound(lot_id))?;
        if delivery.quantity_kg > on_hand {
            return Err(AppError::InsufficientQuantity {
                requested: delivery.quantity_kg,
                available: on_hand,
            });
        }

        let stored = &mut tables.deliveries[index];
        copy_editable(stored, delivery);
        Ok(Some(stored.clone()))
    }

    async fn transition_delivery(
        &self,
        delivery_id: Uuid,
        transition: &DeliveryTransition,
    ) -> AppResult<Option<Delivery>> {
        let mut tables = self.tables.write().await;
        let Some(delivery) = tables
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery_id && d.status == transition.from)
        else {
            return Ok(None);
        };

        delivery.status = transition.to;
        if transition.cancellation_reason.is_some() {
            delivery.cancellation_reason = transition.cancellation_reason.clone();
        }
        delivery.updated_at = transition.at;
        let updated = delivery.clone();

        if transition.release_lot {
            for lot in tables.lots.iter_mut() {
                if lot.claimed_by == Some(delivery_id) {
                    lot.claimed_by = None;
                }
            }
        }
        Ok(Some(updated))
    }

    async fn delete_delivery(&self, delivery_id: Uuid, expected: DeliveryStatus) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables
            .deliveries
            .iter()
            .position(|d| d.id == delivery_id && d.status == expected)
        else {
            return Ok(false);
        };

        tables.deliveries.remove(index);
        for lot in tables.lots.iter_mut() {
            if lot.claimed_by == Some(delivery_id) {
                lot.claimed_by = None;
            }
        }
        Ok(true)
    }
}
