//! Dashboard rollup over approved sales reports

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ReportStatus, SalesReport};
use crate::types::ReportPeriod;

/// Producer with the highest approved revenue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopProducer {
    pub producer_id: Uuid,
    pub revenue: Decimal,
}

/// Aggregate figures over approved reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub period: Option<ReportPeriod>,
    pub producer_count: i64,
    pub total_revenue: Decimal,
    pub total_quantity: Decimal,
    pub total_transactions: i64,
    pub average_revenue_per_producer: Decimal,
    pub top_producer: Option<TopProducer>,
}

impl AnalyticsSummary {
    /// Roll up `reports` in the order given. Anything not approved, or outside
    /// `period` when one is set, is skipped.
    pub fn from_reports<'a>(
        period: Option<ReportPeriod>,
        reports: impl IntoIterator<Item = &'a SalesReport>,
    ) -> Self {
        let mut total_revenue = Decimal::ZERO;
        let mut total_quantity = Decimal::ZERO;
        let mut total_transactions = 0i64;
        // first-seen order keeps the tie-break stable
        let mut per_producer: Vec<(Uuid, Decimal)> = Vec::new();
        let mut index: HashMap<Uuid, usize> = HashMap::new();

        for report in reports {
            if report.status != ReportStatus::Approved {
                continue;
            }
            if period.is_some_and(|p| p != report.period) {
                continue;
            }

            total_revenue += report.total_revenue;
            total_quantity += report.total_quantity;
            total_transactions += i64::from(report.transaction_count);

            let slot = *index.entry(report.producer_id).or_insert_with(|| {
                per_producer.push((report.producer_id, Decimal::ZERO));
                per_producer.len() - 1
            });
            per_producer[slot].1 += report.total_revenue;
        }

        let producer_count = per_producer.len() as i64;
        let average_revenue_per_producer = if producer_count == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(producer_count)).round_dp(2)
        };

        let mut top_producer: Option<TopProducer> = None;
        for (producer_id, revenue) in per_producer {
            if top_producer.as_ref().map_or(true, |top| revenue > top.revenue) {
                top_producer = Some(TopProducer {
                    producer_id,
                    revenue,
                });
            }
        }

        Self {
            period,
            producer_count,
            total_revenue,
            total_quantity,
            total_transactions,
            average_revenue_per_producer,
            top_producer,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::ReportTotals;

    fn report(producer_id: Uuid, period: &str, revenue: i64, status: ReportStatus) -> SalesReport {
        let mut report = SalesReport::new_pending(
            producer_id,
            period.parse().unwrap(),
            ReportTotals {
                total_revenue: Decimal::from(revenue),
                total_quantity: Decimal::from(revenue / 10),
                transaction_count: 2,
            },
            None,
            None,
            Utc::now(),
        );
        report.status = status;
        report
    }

    #[test]
    fn test_only_approved_reports_are_counted() {
        let farmer = Uuid::new_v4();
        let reports = vec![
            report(farmer, "2024-03", 1500, ReportStatus::Approved),
            report(farmer, "2024-03", 900, ReportStatus::Rejected),
            report(Uuid::new_v4(), "2024-03", 700, ReportStatus::Pending),
        ];

        let summary = AnalyticsSummary::from_reports(None, &reports);
        assert_eq!(summary.producer_count, 1);
        assert_eq!(summary.total_revenue, Decimal::from(1500));
        assert_eq!(summary.total_quantity, Decimal::from(150));
        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.average_revenue_per_producer, Decimal::from(1500));
    }

    #[test]
    fn test_period_filter() {
        let farmer = Uuid::new_v4();
        let reports = vec![
            report(farmer, "2024-03", 1500, ReportStatus::Approved),
            report(farmer, "2024-04", 400, ReportStatus::Approved),
        ];

        let summary = AnalyticsSummary::from_reports(Some("2024-04".parse().unwrap()), &reports);
        assert_eq!(summary.total_revenue, Decimal::from(400));
        assert_eq!(summary.period.unwrap().to_string(), "2024-04");
    }

    #[test]
    fn test_top_producer_sums_across_reports() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let reports = vec![
            report(a, "2024-03", 1000, ReportStatus::Approved),
            report(b, "2024-03", 1500, ReportStatus::Approved),
            report(a, "2024-04", 800, ReportStatus::Approved),
        ];

        let summary = AnalyticsSummary::from_reports(None, &reports);
        let top = summary.top_producer.unwrap();
        assert_eq!(top.producer_id, a);
        assert_eq!(top.revenue, Decimal::from(1800));
        assert_eq!(summary.average_revenue_per_producer, Decimal::new(165000, 2));
    }

    #[test]
    fn test_tie_goes_to_first_seen_producer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let reports = vec![
            report(a, "2024-03", 500, ReportStatus::Approved),
            report(b, "2024-03", 500, ReportStatus::Approved),
        ];

        let summary = AnalyticsSummary::from_reports(None, &reports);
        assert_eq!(summary.top_producer.unwrap().producer_id, a);
    }

    #[test]
    fn test_empty_rollup() {
        let reports: Vec<SalesReport> = Vec::new();
        let summary = AnalyticsSummary::from_reports(None, &reports);
        assert_eq!(summary.producer_count, 0);
        assert_eq!(summary.average_revenue_per_producer, Decimal::ZERO);
        assert!(summary.top_producer.is_none());
    }
}
