//! Dashboard analytics over approved sales reports

use std::sync::Arc;

use shared::{AnalyticsSummary, ReportPeriod, ReportStatus};

use crate::error::AppResult;
use crate::store::{LedgerStore, ReportFilter};

/// Read-only rollup service
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn LedgerStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Summarize approved reports, optionally for one period
    pub async fn summary(&self, period: Option<ReportPeriod>) -> AppResult<AnalyticsSummary> {
        let filter = ReportFilter {
            status: Some(ReportStatus::Approved),
            period,
            producer_id: None,
        };
        // oldest first, so ties for top producer go to the earliest submitter
        let reports = self.store.list_reports(&filter).await?;
        Ok(AnalyticsSummary::from_reports(period, &reports))
    }
}
