//! Sales report HTTP handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{ReportPeriod, ReportStatus, ReviewInput, SubmitReportInput};
use uuid::Uuid;

use super::{json_body, path_param, query_params};
use crate::middleware::CurrentActor;
use crate::services::ReportService;
use crate::store::ReportFilter;
use crate::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<ReportStatus>,
    pub period: Option<ReportPeriod>,
    pub producer_id: Option<Uuid>,
    #[serde(default)]
    pub format: ListFormat,
}

/// Submit a monthly sales report
pub async fn submit_report(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    payload: Result<Json<SubmitReportInput>, JsonRejection>,
) -> impl IntoResponse {
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let service = ReportService::new(state.store.clone(), state.config.ledger);

    match service.submit(&actor, input).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List reports, as JSON or CSV
pub async fn list_reports(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<ListReportsQuery>, QueryRejection>,
) -> impl IntoResponse {
    let query = match query_params(query) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };
    let filter = ReportFilter {
        status: query.status,
        period: query.period,
        producer_id: query.producer_id,
    };
    let service = ReportService::new(state.store.clone(), state.config.ledger);

    let reports = match service.list(&actor, filter).await {
        Ok(reports) => reports,
        Err(e) => return e.into_response(),
    };

    match query.format {
        ListFormat::Json => {
            (StatusCode::OK, Json(serde_json::json!({ "reports": reports }))).into_response()
        }
        ListFormat::Csv => match ReportService::export_to_csv(&reports) {
            Ok(csv) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"sales_reports.csv\"",
                    ),
                ],
                csv,
            )
                .into_response(),
            Err(e) => e.into_response(),
        },
    }
}

/// Get a report with its line items
pub async fn get_report(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    report_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let report_id = match path_param(report_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let service = ReportService::new(state.store.clone(), state.config.ledger);

    match service.get(&actor, report_id).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Approve or reject a pending report
pub async fn review_report(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    report_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> impl IntoResponse {
    let report_id = match path_param(report_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let service = ReportService::new(state.store.clone(), state.config.ledger);

    match service.review(&actor, report_id, input).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}
