//! The JSON envelope every API response is wrapped in.

use crate::error::{Error, ErrorKind};
use crate::store::Pagination;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Machine-readable error codes carried in `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_DATA_NOT_FOUND")]
    DataNotFound,
    #[serde(rename = "ERR_TALKING_TO_DATABASE")]
    TalkingToDatabase,
    #[serde(rename = "ERR_DECODING_REQUEST_INPUT")]
    DecodingRequestInput,
    #[serde(rename = "ERR_VALIDATING_REQUEST_INPUT")]
    ValidatingRequestInput,
    #[serde(rename = "ERR_FETCHING_SESSION_CONTEXT_DATA")]
    FetchingSessionContextData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDetails {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(
        rename = "currentHouseholdID",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub current_household_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub details: ResponseDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T, details: ResponseDetails) -> Self {
        Self {
            data: Some(data),
            pagination: None,
            details,
            error: None,
        }
    }

    pub fn page(data: T, pagination: Pagination, details: ResponseDetails) -> Self {
        Self {
            data: Some(data),
            pagination: Some(pagination),
            details,
            error: None,
        }
    }

    pub fn empty(details: ResponseDetails) -> Self {
        Self {
            data: None,
            pagination: None,
            details,
            error: None,
        }
    }
}

/// A failed request: HTTP status plus the error envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiResponse<()>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: ErrorCode,
        message: impl Into<String>,
        details: ResponseDetails,
    ) -> Self {
        Self {
            status,
            body: ApiResponse {
                data: None,
                pagination: None,
                details,
                error: Some(ApiErrorBody {
                    message: message.into(),
                    code,
                }),
            },
        }
    }

    pub fn unauthenticated(details: ResponseDetails) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::FetchingSessionContextData,
            "unauthenticated",
            details,
        )
    }

    pub fn invalid_content(details: ResponseDetails) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::DecodingRequestInput,
            "invalid request content",
            details,
        )
    }

    pub fn not_found(details: ResponseDetails) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::DataNotFound,
            "not found",
            details,
        )
    }

    pub fn database(details: ResponseDetails) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::TalkingToDatabase,
            "database error",
            details,
        )
    }

    /// Map a crate error onto a status and code by its kind.
    pub fn from_error(error: &Error, details: ResponseDetails) -> Self {
        match error.kind() {
            ErrorKind::NotFound => Self::not_found(details),
            ErrorKind::InvalidRequest => Self::new(
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidatingRequestInput,
                error.to_string(),
                details,
            ),
            ErrorKind::Transport | ErrorKind::Serialization | ErrorKind::Cancelled => {
                Self::database(details)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ResponseDetails {
        ResponseDetails {
            trace_id: "trace-1".into(),
            current_household_id: None,
        }
    }

    #[test]
    fn error_envelope_carries_code_and_trace_id() {
        let error = ApiError::database(details());
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);

        let json = serde_json::to_value(&error.body).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "details": {"traceID": "trace-1"},
                "error": {"message": "database error", "code": "ERR_TALKING_TO_DATABASE"},
            })
        );
    }

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (Error::NotFound("row".into()), StatusCode::NOT_FOUND),
            (Error::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (Error::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from_error(&error, details()).status, status);
        }
    }

    #[test]
    fn empty_pages_still_carry_pagination() {
        let response = ApiResponse::page(
            Vec::<String>::new(),
            Pagination {
                page: 1,
                limit: 50,
                total_count: 0,
                filtered_count: 0,
            },
            details(),
        );

        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(json["pagination"]["limit"], 50);
        assert!(json.get("error").is_none());
    }
}
