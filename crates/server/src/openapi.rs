use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct AddMetricRequestDoc {
    pub name: String,
    /// Free-form fields stored as the metric document.
    #[schema(value_type = Object)]
    pub values: serde_json::Value,
}

#[derive(ToSchema)]
pub struct UpdateMetricRequestDoc {
    /// Fields merged into the stored document.
    #[schema(value_type = Object)]
    pub values: serde_json::Value,
}

#[derive(ToSchema)]
pub struct MessageDoc { pub message: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::metrics::add_metric,
        crate::routes::metrics::get_metrics,
        crate::routes::metrics::update_metric,
        crate::routes::metrics::delete_metric,
    ),
    components(
        schemas(
            HealthResponse,
            AddMetricRequestDoc,
            UpdateMetricRequestDoc,
            MessageDoc,
            ErrorDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "metrics")
    )
)]
pub struct ApiDoc;
