//! HTTP handlers for the Fiber Trade Ledger API

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Json, Path, Query};

use crate::error::{AppError, AppResult};

pub mod analytics;
pub mod delivery;
pub mod health;
pub mod lot;
pub mod report;

pub use analytics::*;
pub use delivery::*;
pub use health::*;
pub use lot::*;
pub use report::*;

/// Unwrap a JSON body, turning malformed or unknown fields into a validation error
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation("body", rejection.body_text()))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params
        .map(|Query(query)| query)
        .map_err(|rejection| AppError::validation("query", rejection.body_text()))
}

/// Unwrap a path segment such as a record id; a malformed one is a validation error
fn path_param<T>(param: Result<Path<T>, PathRejection>) -> AppResult<T> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| AppError::validation("path", rejection.body_text()))
}
