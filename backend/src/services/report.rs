//! Sales report service: submission, review and export

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shared::{
    review_report, validate_transaction_entries, Actor, ReportTotals, ReviewInput,
    SalesReport, SalesReportDetail, SubmitReportInput, TransactionEntry,
};
use uuid::Uuid;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, ReportFilter, ReportReview};

/// Service for sales reports
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn LedgerStore>,
    ledger: LedgerConfig,
}

/// Flat row written by the CSV export
#[derive(Debug, Serialize)]
struct ReportCsvRow<'a> {
    id: Uuid,
    producer_id: Uuid,
    period: String,
    status: &'static str,
    total_revenue: String,
    total_quantity: String,
    transaction_count: i32,
    submitted_at: String,
    reviewed_at: Option<String>,
    rejection_reason: Option<&'a str>,
}

impl ReportService {
    pub fn new(store: Arc<dyn LedgerStore>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Validate a farmer's transactions, aggregate them and store the report
    /// with its lines as one unit.
    ///
    /// A repeated `idempotency_key` returns the report stored the first time.
    pub async fn submit(&self, actor: &Actor, input: SubmitReportInput) -> AppResult<SalesReport> {
        if !actor.is_farmer() {
            return Err(AppError::InsufficientPermissions(
                "only farmers can submit sales reports".to_string(),
            ));
        }
        input.validate()?;
        validate_transaction_entries(&input.transactions, self.ledger.line_amount_tolerance)?;

        let idempotency_key = input
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.store.find_report_by_idempotency_key(actor.id, key).await? {
                tracing::info!(report_id = %existing.id, "Replayed report submission");
                return Ok(existing);
            }
        }

        let totals = ReportTotals::from_entries(&input.transactions);
        let report = SalesReport::new_pending(
            actor.id,
            input.period,
            totals,
            input.notes,
            idempotency_key.clone(),
            Utc::now(),
        );
        let lines: Vec<_> = input
            .transactions
            .into_iter()
            .map(|entry: TransactionEntry| entry.into_line_item(report.id))
            .collect();

        match self.store.insert_report(&report, &lines).await {
            Ok(()) => {}
            // lost a race with a concurrent retry carrying the same key
            Err(AppError::DuplicateEntry(field)) => {
                let Some(key) = idempotency_key.as_deref() else {
                    return Err(AppError::DuplicateEntry(field));
                };
                return self
                    .store
                    .find_report_by_idempotency_key(actor.id, key)
                    .await?
                    .ok_or(AppError::DuplicateEntry(field));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            report_id = %report.id,
            producer_id = %report.producer_id,
            period = %report.period,
            transactions = report.transaction_count,
            "Sales report submitted"
        );
        Ok(report)
    }

    /// Reports visible to `actor`, oldest submission first
    pub async fn list(&self, actor: &Actor, filter: ReportFilter) -> AppResult<Vec<SalesReport>> {
        let filter = if actor.is_reviewer() {
            filter
        } else if actor.is_farmer() {
            ReportFilter {
                producer_id: Some(actor.id),
                ..filter
            }
        } else {
            return Err(AppError::InsufficientPermissions(
                "buyers cannot view sales reports".to_string(),
            ));
        };
        self.store.list_reports(&filter).await
    }

    /// A report with its line items
    pub async fn get(&self, actor: &Actor, report_id: Uuid) -> AppResult<SalesReportDetail> {
        let report = self
            .store
            .get_report(report_id)
            .await?
            .filter(|r| actor.is_reviewer() || (actor.is_farmer() && r.producer_id == actor.id))
            .ok_or_else(|| AppError::NotFound("Sales report".to_string()))?;
        let lines = self.store.report_lines(report_id).await?;
        Ok(SalesReportDetail { report, lines })
    }

    /// Approve or reject a pending report
    pub async fn review(
        &self,
        actor: &Actor,
        report_id: Uuid,
        input: ReviewInput,
    ) -> AppResult<SalesReport> {
        if !actor.is_reviewer() {
            return Err(AppError::InsufficientPermissions(
                "only reviewers can review sales reports".to_string(),
            ));
        }
        let current = self
            .store
            .get_report(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales report".to_string()))?;

        let outcome = review_report(
            current.status,
            input.decision,
            input.rejection_reason.as_deref(),
        )
        .map_err(|e| {
            tracing::warn!(report_id = %report_id, "Review rejected: {}", e);
            AppError::from(e)
        })?;

        let review = ReportReview {
            status: outcome.status,
            reviewer_id: actor.id,
            reviewed_at: Utc::now(),
            rejection_reason: outcome.rejection_reason,
        };
        let Some(updated) = self
            .store
            .apply_review(report_id, current.status, &review)
            .await?
        else {
            tracing::warn!(report_id = %report_id, "Concurrent review lost the race");
            return Err(AppError::InvalidTransition(format!(
                "report {} was reviewed concurrently",
                report_id
            )));
        };

        tracing::info!(
            report_id = %report_id,
            reviewer_id = %actor.id,
            status = %updated.status,
            "Sales report reviewed"
        );
        Ok(updated)
    }

    /// Render reports as CSV
    pub fn export_to_csv(reports: &[SalesReport]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for report in reports {
            wtr.serialize(ReportCsvRow {
                id: report.id,
                producer_id: report.producer_id,
                period: report.period.to_string(),
                status: report.status.as_str(),
                total_revenue: report.total_revenue.to_string(),
                total_quantity: report.total_quantity.to_string(),
                transaction_count: report.transaction_count,
                submitted_at: report.submitted_at.to_rfc3339(),
                reviewed_at: report.reviewed_at.map(|t| t.to_rfc3339()),
                rejection_reason: report.rejection_reason.as_deref(),
            })
            .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV flush error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV encoding error: {}", e)))
    }
}
