use crate::errors::ServiceError;
use crate::{ApiResponse, PaginationMeta};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Success response carrying a user-facing message
pub fn success_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success_with_message(message, data)),
    )
        .into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(message, data)),
    )
        .into_response()
}

/// Paginated listing response
pub fn paginated_response<T: Serialize>(
    data: Vec<T>,
    page: u64,
    per_page: u64,
    total: u64,
) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::paginated(
            data,
            PaginationMeta::new(page, per_page, total),
        )),
    )
        .into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))
}

/// Parses a path segment that must be a UUID, reporting a domain-shaped 400
/// instead of the generic extractor rejection.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::ValidationError(format!("Invalid {} ID", what)))
}

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let params: PaginationParams = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 20);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid", "order").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "order").unwrap(), id);
    }
}
