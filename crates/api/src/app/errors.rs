use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use eggmart_core::DomainError;
use eggmart_infra::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Gateway(e) => json_error(StatusCode::BAD_GATEWAY, "gateway_error", e.to_string()),
        ServiceError::Persistence(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
        }
        ServiceError::NotConfigured(what) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "not_configured",
            format!("{what} is not configured"),
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InsufficientStock { available, requested } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        DomainError::InvalidTransition { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body id, answering 400 on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(domain_error_to_response)
}
