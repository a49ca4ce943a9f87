//! Inventory lot HTTP handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::RegisterLotInput;
use uuid::Uuid;

use super::{json_body, path_param, query_params};
use crate::middleware::CurrentActor;
use crate::services::LotService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListLotsQuery {
    #[serde(default)]
    pub available_only: bool,
}

/// Register a harvested lot
pub async fn register_lot(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    payload: Result<Json<RegisterLotInput>, JsonRejection>,
) -> impl IntoResponse {
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let service = LotService::new(state.store.clone());

    match service.register(&actor, input).await {
        Ok(lot) => (StatusCode::CREATED, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List lots visible to the caller
pub async fn list_lots(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<ListLotsQuery>, QueryRejection>,
) -> impl IntoResponse {
    let query = match query_params(query) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };
    let service = LotService::new(state.store.clone());

    match service.list(&actor, query.available_only).await {
        Ok(lots) => (StatusCode::OK, Json(serde_json::json!({ "lots": lots }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a single lot
pub async fn get_lot(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    lot_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let lot_id = match path_param(lot_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let service = LotService::new(state.store.clone());

    match service.get(&actor, lot_id).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}
