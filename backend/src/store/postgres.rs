//! PostgreSQL ledger store
//!
//! Multi-row writes run inside one transaction; dropping the transaction on an
//! early return rolls it back. The lot claim locks the lot row with
//! `SELECT ... FOR UPDATE` so concurrent allocations serialize on it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Delivery, DeliveryStatus, InventoryLot, ReportPeriod, ReportStatus, SalesLineItem,
    SalesReport,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    DeliveryFilter, DeliveryTransition, LedgerStore, LotFilter, ReportFilter, ReportReview,
};
use crate::error::{AppError, AppResult};

const LOT_COLUMNS: &str =
    "id, producer_id, variety, grade, quantity_kg, harvest_date, location, claimed_by, created_at";

const REPORT_COLUMNS: &str = "id, producer_id, period, total_revenue, total_quantity, \
     transaction_count, notes, status, submitted_at, reviewed_by, reviewed_at, \
     rejection_reason, idempotency_key";

const LINE_COLUMNS: &str =
    "id, report_id, counterparty, grade, quantity, unit_price, total_amount, sale_date, payment_method";

const DELIVERY_COLUMNS: &str = "id, producer_id, buyer_id, lot_id, scheduled_date, \
     scheduled_time, variety, grade, quantity_kg, unit_price, total_amount, pickup_location, \
     dropoff_location, producer_contact, buyer_contact, delivery_method, status, payment_status, \
     payment_method, notes, cancellation_reason, created_at, updated_at";

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn parse_column<T>(value: &str, column: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| AppError::Internal(format!("corrupt {} column: {}", column, e)))
}

#[derive(Debug, FromRow)]
struct LotRow {
    id: Uuid,
    producer_id: Uuid,
    variety: String,
    grade: String,
    quantity_kg: Decimal,
    harvest_date: NaiveDate,
    location: String,
    claimed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<LotRow> for InventoryLot {
    fn from(row: LotRow) -> Self {
        InventoryLot {
            id: row.id,
            producer_id: row.producer_id,
            variety: row.variety,
            grade: row.grade,
            quantity_kg: row.quantity_kg,
            harvest_date: row.harvest_date,
            location: row.location,
            claimed_by: row.claimed_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    producer_id: Uuid,
    period: String,
    total_revenue: Decimal,
    total_quantity: Decimal,
    transaction_count: i32,
    notes: Option<String>,
    status: String,
    submitted_at: DateTime<Utc>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    idempotency_key: Option<String>,
}

impl TryFrom<ReportRow> for SalesReport {
    type Error = AppError;

    fn try_from(row: ReportRow) -> AppResult<Self> {
        Ok(SalesReport {
            id: row.id,
            producer_id: row.producer_id,
            period: row
                .period
                .parse::<ReportPeriod>()
                .map_err(|e| AppError::Internal(format!("corrupt period column: {}", e)))?,
            total_revenue: row.total_revenue,
            total_quantity: row.total_quantity,
            transaction_count: row.transaction_count,
            notes: row.notes,
            status: parse_column(&row.status, "status")?,
            submitted_at: row.submitted_at,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            rejection_reason: row.rejection_reason,
            idempotency_key: row.idempotency_key,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: Uuid,
    report_id: Uuid,
    counterparty: String,
    grade: String,
    quantity: Decimal,
    unit_price: Decimal,
    total_amount: Decimal,
    sale_date: NaiveDate,
    payment_method: String,
}

impl TryFrom<LineRow> for SalesLineItem {
    type Error = AppError;

    fn try_from(row: LineRow) -> AppResult<Self> {
        Ok(SalesLineItem {
            id: row.id,
            report_id: row.report_id,
            counterparty: row.counterparty,
            grade: row.grade,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_amount: row.total_amount,
            sale_date: row.sale_date,
            payment_method: parse_column(&row.payment_method, "payment_method")?,
        })
    }
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: Uuid,
    producer_id: Uuid,
    buyer_id: Uuid,
    lot_id: Uuid,
    scheduled_date: NaiveDate,
    scheduled_time: NaiveTime,
    variety: String,
    grade: String,
    quantity_kg: Decimal,
    unit_price: Decimal,
    total_amount: Decimal,
    pickup_location: String,
    dropoff_location: String,
    producer_contact: String,
    buyer_contact: String,
    delivery_method: String,
    status: String,
    payment_status: String,
    payment_method: String,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = AppError;

    fn try_from(row: DeliveryRow) -> AppResult<Self> {
        Ok(Delivery {
            id: row.id,
            producer_id: row.producer_id,
            buyer_id: row.buyer_id,
            lot_id: row.lot_id,
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            variety: row.variety,
            grade: row.grade,
            quantity_kg: row.quantity_kg,
            unit_price: row.unit_price,
            total_amount: row.total_amount,
            pickup_location: row.pickup_location,
            dropoff_location: row.dropoff_location,
            producer_contact: row.producer_contact,
            buyer_contact: row.buyer_contact,
            delivery_method: parse_column(&row.delivery_method, "delivery_method")?,
            status: parse_column(&row.status, "status")?,
            payment_status: parse_column(&row.payment_status, "payment_status")?,
            payment_method: parse_column(&row.payment_method, "payment_method")?,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_models<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn insert_lot(&self, lot: &InventoryLot) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_lots (
                id, producer_id, variety, grade, quantity_kg, harvest_date, location,
                claimed_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(lot.id)
        .bind(lot.producer_id)
        .bind(&lot.variety)
        .bind(&lot.grade)
        .bind(lot.quantity_kg)
        .bind(lot.harvest_date)
        .bind(&lot.location)
        .bind(lot.claimed_by)
        .bind(lot.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry("lot id".to_string())
            } else {
                AppError::Persistence(format!("lot: {}", e))
            }
        })?;

        Ok(())
    }

    async fn get_lot(&self, lot_id: Uuid) -> AppResult<Option<InventoryLot>> {
        let row = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM inventory_lots WHERE id = $1",
            LOT_COLUMNS
        ))
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(InventoryLot::from))
    }

    async fn list_lots(&self, filter: &LotFilter) -> AppResult<Vec<InventoryLot>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM inventory_lots WHERE TRUE",
            LOT_COLUMNS
        ));
        if let Some(producer_id) = filter.producer_id {
            query.push(" AND producer_id = ").push_bind(producer_id);
        }
        if filter.available_only {
            query.push(" AND claimed_by IS NULL");
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query.build_query_as::<LotRow>().fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(InventoryLot::from).collect())
    }

    async fn insert_report(&self, report: &SalesReport, lines: &[SalesLineItem]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales_reports (
                id, producer_id, period, total_revenue, total_quantity, transaction_count,
                notes, status, submitted_at, idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(report.id)
        .bind(report.producer_id)
        .bind(report.period.to_string())
        .bind(report.total_revenue)
        .bind(report.total_quantity)
        .bind(report.transaction_count)
        .bind(&report.notes)
        .bind(report.status.as_str())
        .bind(report.submitted_at)
        .bind(&report.idempotency_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) && report.idempotency_key.is_some() {
                AppError::DuplicateEntry("idempotency_key".to_string())
            } else {
                AppError::Persistence(format!("report: {}", e))
            }
        })?;

        for (i, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sales_line_items (
                    id, report_id, counterparty, grade, quantity, unit_price, total_amount,
                    sale_date, payment_method
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.id)
            .bind(line.report_id)
            .bind(&line.counterparty)
            .bind(&line.grade)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total_amount)
            .bind(line.sale_date)
            .bind(line.payment_method.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("line item {} of {}: {}", i + 1, lines.len(), e))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("commit: {}", e)))?;

        Ok(())
    }

    async fn find_report_by_idempotency_key(
        &self,
        producer_id: Uuid,
        key: &str,
    ) -> AppResult<Option<SalesReport>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM sales_reports WHERE producer_id = $1 AND idempotency_key = $2",
            REPORT_COLUMNS
        ))
        .bind(producer_id)
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        row.map(SalesReport::try_from).transpose()
    }

    async fn get_report(&self, report_id: Uuid) -> AppResult<Option<SalesReport>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM sales_reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(SalesReport::try_from).transpose()
    }

    async fn report_lines(&self, report_id: Uuid) -> AppResult<Vec<SalesLineItem>> {
        let rows = sqlx::query_as::<_, LineRow>(&format!(
            "SELECT {} FROM sales_line_items WHERE report_id = $1 ORDER BY sale_date, id",
            LINE_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        into_models(rows)
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<SalesReport>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM sales_reports WHERE TRUE",
            REPORT_COLUMNS
        ));
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(period) = filter.period {
            query.push(" AND period = ").push_bind(period.to_string());
        }
        if let Some(producer_id) = filter.producer_id {
            query.push(" AND producer_id = ").push_bind(producer_id);
        }
        query.push(" ORDER BY submitted_at, id");

        let rows = query.build_query_as::<ReportRow>().fetch_all(&self.db).await?;
        into_models(rows)
    }

    async fn apply_review(
        &self,
        report_id: Uuid,
        expected: ReportStatus,
        review: &ReportReview,
    ) -> AppResult<Option<SalesReport>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            UPDATE sales_reports
            SET status = $1, reviewed_by = $2, reviewed_at = $3, rejection_reason = $4
            WHERE id = $5 AND status = $6
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(review.status.as_str())
        .bind(review.reviewer_id)
        .bind(review.reviewed_at)
        .bind(&review.rejection_reason)
        .bind(report_id)
        .bind(expected.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(SalesReport::try_from).transpose()
    }

    async fn claim_lot_for_delivery(&self, delivery: &Delivery) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let (on_hand, claimed_by) = sqlx::query_as::<_, (Decimal, Option<Uuid>)>(
            "SELECT quantity_kg, claimed_by FROM inventory_lots WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery.lot_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::LotNotFound(delivery.lot_id))?;

        if claimed_by.is_some() {
            return Err(AppError::LotAlreadyClaimed(delivery.lot_id));
        }
        if delivery.quantity_kg > on_hand {
            return Err(AppError::InsufficientQuantity {
                requested: delivery.quantity_kg,
                available: on_hand,
            });
        }

        sqlx::query(&format!(
            r#"
            INSERT INTO deliveries ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23)
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(delivery.id)
        .bind(delivery.producer_id)
        .bind(delivery.buyer_id)
        .bind(delivery.lot_id)
        .bind(delivery.scheduled_date)
        .bind(delivery.scheduled_time)
        .bind(&delivery.variety)
        .bind(&delivery.grade)
        .bind(delivery.quantity_kg)
        .bind(delivery.unit_price)
        .bind(delivery.total_amount)
        .bind(&delivery.pickup_location)
        .bind(&delivery.dropoff_location)
        .bind(&delivery.producer_contact)
        .bind(&delivery.buyer_contact)
        .bind(delivery.delivery_method.as_str())
        .bind(delivery.status.as_str())
        .bind(delivery.payment_status.as_str())
        .bind(delivery.payment_method.as_str())
        .bind(&delivery.notes)
        .bind(&delivery.cancellation_reason)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // the active-lot index backs up the row lock
            if is_unique_violation(&e) {
                AppError::LotAlreadyClaimed(delivery.lot_id)
            } else {
                AppError::Persistence(format!("delivery: {}", e))
            }
        })?;

        sqlx::query("UPDATE inventory_lots SET claimed_by = $1 WHERE id = $2")
            .bind(delivery.id)
            .bind(delivery.lot_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Persistence(format!("lot claim: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("commit: {}", e)))?;

        Ok(())
    }

    async fn get_delivery(&self, delivery_id: Uuid) -> AppResult<Option<Delivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Delivery::try_from).transpose()
    }

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> AppResult<Vec<Delivery>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM deliveries WHERE TRUE",
            DELIVERY_COLUMNS
        ));
        if let Some(producer_id) = filter.producer_id {
            query.push(" AND producer_id = ").push_bind(producer_id);
        }
        if let Some(buyer_id) = filter.buyer_id {
            query.push(" AND buyer_id = ").push_bind(buyer_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, id");

        let rows = query.build_query_as::<DeliveryRow>().fetch_all(&self.db).await?;
        into_models(rows)
    }

    async fn update_delivery(
        &self,
        delivery: &Delivery,
        expected: DeliveryStatus,
    ) -> AppResult<Option<Delivery>> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT status, lot_id FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status, lot_id)) = current else {
            return Ok(None);
        };
        if status != expected.as_str() {
            return Ok(None);
        }

        let on_hand = sqlx::query_scalar::<_, Decimal>(
            "SELECT quantity_kg FROM inventory_lots WHERE id = $1 FOR SHARE",
        )
        .bind(lot_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::LotNotFound(lot_id))?;

        if delivery.quantity_kg > on_hand {
            return Err(AppError::InsufficientQuantity {
                requested: delivery.quantity_kg,
                available: on_hand,
            });
        }

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            UPDATE deliveries
            SET scheduled_date = $1, scheduled_time = $2, quantity_kg = $3, unit_price = $4,
                total_amount = $5, pickup_location = $6, dropoff_location = $7,
                producer_contact = $8, buyer_contact = $9, delivery_method = $10,
                payment_status = $11, payment_method = $12, notes = $13, updated_at = $14
            WHERE id = $15
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(delivery.scheduled_date)
        .bind(delivery.scheduled_time)
        .bind(delivery.quantity_kg)
        .bind(delivery.unit_price)
        .bind(delivery.total_amount)
        .bind(&delivery.pickup_location)
        .bind(&delivery.dropoff_location)
        .bind(&delivery.producer_contact)
        .bind(&delivery.buyer_contact)
        .bind(delivery.delivery_method.as_str())
        .bind(delivery.payment_status.as_str())
        .bind(delivery.payment_method.as_str())
        .bind(&delivery.notes)
        .bind(delivery.updated_at)
        .bind(delivery.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Persistence(format!("delivery: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("commit: {}", e)))?;

        Delivery::try_from(row).map(Some)
    }

    async fn transition_delivery(
        &self,
        delivery_id: Uuid,
        transition: &DeliveryTransition,
    ) -> AppResult<Option<Delivery>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            UPDATE deliveries
            SET status = $1,
                cancellation_reason = COALESCE($2, cancellation_reason),
                updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(transition.to.as_str())
        .bind(&transition.cancellation_reason)
        .bind(transition.at)
        .bind(delivery_id)
        .bind(transition.from.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Persistence(format!("delivery status: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        if transition.release_lot {
            sqlx::query("UPDATE inventory_lots SET claimed_by = NULL WHERE claimed_by = $1")
                .bind(delivery_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Persistence(format!("lot release: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("commit: {}", e)))?;

        Delivery::try_from(row).map(Some)
    }

    async fn delete_delivery(&self, delivery_id: Uuid, expected: DeliveryStatus) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?;

        if status.as_deref() != Some(expected.as_str()) {
            return Ok(false);
        }

        sqlx::query("UPDATE inventory_lots SET claimed_by = NULL WHERE claimed_by = $1")
            .bind(delivery_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Persistence(format!("lot release: {}", e)))?;

        sqlx::query("DELETE FROM deliveries WHERE id = $1")
            .bind(delivery_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Persistence(format!("delivery: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Persistence(format!("commit: {}", e)))?;

        Ok(true)
    }
}
