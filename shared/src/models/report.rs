//! Monthly sales report models and aggregation

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::ReportPeriod;
use crate::validation::{non_negative_decimal, not_blank, positive_decimal};

/// Upper bound on line items accepted in one submission
pub const MAX_TRANSACTIONS_PER_REPORT: usize = 1000;

/// Lifecycle status of a sales report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("unknown report status '{}'", other)),
        }
    }
}

/// How a buyer settled a sale or delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Check,
    MobileWallet,
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::MobileWallet => "mobile_wallet",
            PaymentMethod::Credit => "credit",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "check" => Ok(PaymentMethod::Check),
            "mobile_wallet" => Ok(PaymentMethod::MobileWallet),
            "credit" => Ok(PaymentMethod::Credit),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// A producer's monthly sales report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesReport {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub period: ReportPeriod,
    pub total_revenue: Decimal,
    pub total_quantity: Decimal,
    pub transaction_count: i32,
    pub notes: Option<String>,
    pub status: ReportStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl SalesReport {
    /// New report at `pending` carrying precomputed totals
    pub fn new_pending(
        producer_id: Uuid,
        period: ReportPeriod,
        totals: ReportTotals,
        notes: Option<String>,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            producer_id,
            period,
            total_revenue: totals.total_revenue,
            total_quantity: totals.total_quantity,
            transaction_count: totals.transaction_count,
            notes,
            status: ReportStatus::Pending,
            submitted_at: now,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            idempotency_key,
        }
    }

    pub fn totals(&self) -> ReportTotals {
        ReportTotals {
            total_revenue: self.total_revenue,
            total_quantity: self.total_quantity,
            transaction_count: self.transaction_count,
        }
    }
}

/// One sale inside a report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesLineItem {
    pub id: Uuid,
    pub report_id: Uuid,
    pub counterparty: String,
    pub grade: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub sale_date: NaiveDate,
    pub payment_method: PaymentMethod,
}

/// Report together with its line items
#[derive(Debug, Clone, Serialize)]
pub struct SalesReportDetail {
    #[serde(flatten)]
    pub report: SalesReport,
    pub lines: Vec<SalesLineItem>,
}

/// A raw per-transaction sales entry as submitted by a farmer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TransactionEntry {
    #[validate(length(max = 200), custom = "not_blank")]
    pub counterparty: String,
    #[validate(length(max = 50), custom = "not_blank")]
    pub grade: String,
    #[validate(custom = "positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "non_negative_decimal")]
    pub unit_price: Decimal,
    #[validate(custom = "non_negative_decimal")]
    pub total_amount: Decimal,
    pub sale_date: NaiveDate,
    pub payment_method: PaymentMethod,
}

impl TransactionEntry {
    pub fn into_line_item(self, report_id: Uuid) -> SalesLineItem {
        SalesLineItem {
            id: Uuid::new_v4(),
            report_id,
            counterparty: self.counterparty.trim().to_string(),
            grade: self.grade.trim().to_string(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_amount: self.total_amount,
            sale_date: self.sale_date,
            payment_method: self.payment_method,
        }
    }
}

/// Body of a sales report submission
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitReportInput {
    pub period: ReportPeriod,
    #[validate(length(min = 1, message = "At least one transaction is required"))]
    pub transactions: Vec<TransactionEntry>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Client token making retried submissions safe
    #[validate(length(min = 1, max = 100))]
    pub idempotency_key: Option<String>,
}

/// Derived report aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub total_revenue: Decimal,
    pub total_quantity: Decimal,
    pub transaction_count: i32,
}

impl ReportTotals {
    /// Sum totals over entries that passed `validate_transaction_entries`;
    /// independent of entry order
    pub fn from_entries(entries: &[TransactionEntry]) -> Self {
        Self::sum(entries.iter().map(|e| (e.total_amount, e.quantity)))
    }

    /// Recompute totals from persisted line items
    pub fn from_lines(lines: &[SalesLineItem]) -> Self {
        Self::sum(lines.iter().map(|l| (l.total_amount, l.quantity)))
    }

    fn sum(amounts: impl Iterator<Item = (Decimal, Decimal)>) -> Self {
        let mut totals = Self {
            total_revenue: Decimal::ZERO,
            total_quantity: Decimal::ZERO,
            transaction_count: 0,
        };
        for (amount, quantity) in amounts {
            totals.total_revenue += amount;
            totals.total_quantity += quantity;
            totals.transaction_count += 1;
        }
        totals
    }
}
