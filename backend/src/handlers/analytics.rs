//! Analytics HTTP handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::ReportPeriod;

use super::query_params;
use crate::error::AppError;
use crate::middleware::CurrentActor;
use crate::services::AnalyticsService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<ReportPeriod>,
}

/// Dashboard summary over approved reports
pub async fn get_analytics(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> impl IntoResponse {
    if actor.is_buyer() {
        return AppError::InsufficientPermissions("buyers cannot view analytics".to_string())
            .into_response();
    }
    let query = match query_params(query) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };
    let service = AnalyticsService::new(state.store.clone());

    match service.summary(query.period).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}
