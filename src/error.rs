use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;

/// Error taxonomy surfaced by the core operations.
///
/// `Database` and `Internal` log their detail server-side and return a
/// generic message; the rest carry a specific user-facing reason. Nothing is
/// retried here — the caller decides whether a resubmission is safe.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input; rejected before any side effect.
    BadRequest(String),
    /// No matching resource or empty result set.
    NotFound(String),
    /// Insufficient credits, duplicate-key races, and similar state conflicts.
    Conflict(String),
    /// A storage or mail collaborator failed.
    Integration(String),
    /// Unexpected store failure.
    Database(sqlx::Error),
    /// Anything else unexpected.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, "NotFound", msg)
            }
            ApiError::Conflict(msg) => {
                log::info!("conflict: {}", msg);
                (Status::Conflict, "Conflict", msg)
            }
            ApiError::Integration(msg) => {
                log::error!("collaborator failure: {}", msg);
                (
                    Status::BadGateway,
                    "IntegrationFailure",
                    "An external service failed".to_string(),
                )
            }
            ApiError::Database(e) => {
                log::error!("database error: {}", e);
                (
                    Status::InternalServerError,
                    "DatabaseError",
                    "Internal database error".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                (
                    Status::InternalServerError,
                    "InternalError",
                    "Internal server error".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl rocket_okapi::response::OpenApiResponderInner for ApiError {
    fn responses(
        _gen: &mut rocket_okapi::gen::OpenApiGenerator,
    ) -> rocket_okapi::Result<okapi::openapi3::Responses> {
        Ok(okapi::openapi3::Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::Database(err),
        }
    }
}
