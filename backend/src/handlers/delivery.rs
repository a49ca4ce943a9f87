//! Delivery HTTP handlers

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
use shared::{CancelDeliveryInput, CreateDeliveryInput, DeliveryStatus, UpdateDeliveryInput};
use uuid::Uuid;

use super::{json_body, path_param, query_params};
use crate::middleware::CurrentActor;
use crate::services::DeliveryService;
use crate::store::DeliveryFilter;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListDeliveriesQuery {
    pub producer_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
}

fn service(state: &AppState) -> DeliveryService {
    DeliveryService::new(state.store.clone(), state.config.ledger)
}

/// Allocate a lot to a new delivery
pub async fn create_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    payload: Result<Json<CreateDeliveryInput>, JsonRejection>,
) -> impl IntoResponse {
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match service(&state).create(&actor, input).await {
        Ok(delivery) => (StatusCode::CREATED, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List deliveries visible to the caller
pub async fn list_deliveries(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<ListDeliveriesQuery>, QueryRejection>,
) -> impl IntoResponse {
    let query = match query_params(query) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };
    let filter = DeliveryFilter {
        producer_id: query.producer_id,
        buyer_id: None,
        status: query.status,
    };

    match service(&state).list(&actor, filter).await {
        Ok(deliveries) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deliveries": deliveries })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match service(&state).get(&actor, delivery_id).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Edit an in-transit delivery
pub async fn update_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateDeliveryInput>, JsonRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match service(&state).update(&actor, delivery_id, input).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match service(&state).delete(&actor, delivery_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match service(&state).mark_delivered(&actor, delivery_id).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn complete_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match service(&state).complete(&actor, delivery_id).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Cancel a delivery; the body must carry a reason
pub async fn cancel_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    delivery_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CancelDeliveryInput>, JsonRejection>,
) -> impl IntoResponse {
    let delivery_id = match path_param(delivery_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let input = match json_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match service(&state).cancel(&actor, delivery_id, input).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => e.into_response(),
    }
}
