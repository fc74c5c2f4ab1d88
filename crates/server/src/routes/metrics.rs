use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::types::MessageBody;
use service::metrics::{MetricMap, MetricValues};

use crate::errors::ApiError;
use crate::state::AppState;

/// Body of `POST /add-metric`. Fields are loosely typed so that a wrong type
/// is reported the same way as a missing field.
#[derive(Debug, Default, Deserialize)]
pub struct AddMetricRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub values: Option<Value>,
}

impl AddMetricRequest {
    fn into_parts(self) -> (String, MetricValues) {
        let name = match self.name {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        (name, object_or_empty(self.values))
    }
}

/// Body of `PUT /update-metric/:name`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMetricRequest {
    #[serde(default)]
    pub values: Option<Value>,
}

fn object_or_empty(v: Option<Value>) -> MetricValues {
    match v {
        Some(Value::Object(map)) => map,
        _ => MetricValues::new(),
    }
}

/// An unreadable body counts as one with no fields.
fn or_default<T: Default>(body: Result<Json<T>, JsonRejection>, route: &str) -> T {
    match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(route, error = %rejection, "request body rejected");
            T::default()
        }
    }
}

#[utoipa::path(post, path = "/add-metric", tag = "metrics", request_body = crate::openapi::AddMetricRequestDoc, responses((status = 200, description = "Saved", body = crate::openapi::MessageDoc), (status = 400, description = "Missing data", body = crate::openapi::ErrorDoc), (status = 500, description = "Store error", body = crate::openapi::ErrorDoc)))]
pub async fn add_metric(
    State(state): State<AppState>,
    body: Result<Json<AddMetricRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let (name, values) = or_default(body, "add-metric").into_parts();
    state.metrics.create_or_replace(&name, values).await?;
    Ok(Json(MessageBody::new("Metric successfully saved")))
}

#[utoipa::path(get, path = "/get-metrics", tag = "metrics", responses((status = 200, description = "All metrics keyed by name"), (status = 500, description = "Store error", body = crate::openapi::ErrorDoc)))]
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<MetricMap>, ApiError> {
    Ok(Json(state.metrics.list_all().await?))
}

#[utoipa::path(put, path = "/update-metric/{name}", tag = "metrics", params(("name" = String, Path, description = "Metric name")), request_body = crate::openapi::UpdateMetricRequestDoc, responses((status = 200, description = "Updated", body = crate::openapi::MessageDoc), (status = 400, description = "Missing values for update", body = crate::openapi::ErrorDoc), (status = 404, description = "Metric not found", body = crate::openapi::ErrorDoc), (status = 500, description = "Store error", body = crate::openapi::ErrorDoc)))]
pub async fn update_metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<UpdateMetricRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let values = object_or_empty(or_default(body, "update-metric").values);
    state.metrics.partial_update(&name, values).await?;
    Ok(Json(MessageBody::new("Metric successfully updated")))
}

#[utoipa::path(delete, path = "/delete-metric/{name}", tag = "metrics", params(("name" = String, Path, description = "Metric name")), responses((status = 200, description = "Deleted", body = crate::openapi::MessageDoc), (status = 404, description = "Metric not found", body = crate::openapi::ErrorDoc), (status = 500, description = "Store error", body = crate::openapi::ErrorDoc)))]
pub async fn delete_metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    state.metrics.delete(&name).await?;
    Ok(Json(MessageBody::new("Metric successfully deleted")))
}
