// src/routes/mod.rs

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub mod auth_logs;
pub mod bookings;
pub mod categories;
pub mod client_partners;
pub mod clients;
pub mod eois;
pub mod health;
pub mod projects;

/// Handler error: a status plus a message, rendered as the `{"error": …}`
/// JSON body the admin panel reads. 400 = validation/duplicate key,
/// 404 = absent resource, 500 = everything else.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{what} not found"),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// Common error mapper
pub fn internal_error<E: std::fmt::Display>(e: E) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("internal error: {e}"),
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if matches!(e, sqlx::Error::RowNotFound) {
            return Self::not_found("record");
        }
        if let Some(db) = e.as_database_error() {
            match db.code().as_deref() {
                Some("23505") => {
                    return Self::validation(format!("duplicate key: {}", db.message()));
                }
                Some("23503") => return Self::validation(db.message().to_string()),
                _ => {}
            }
        }
        internal_error(e)
    }
}

// ───────────────────────────────────────
// Extractors
// ───────────────────────────────────────
// Same as axum's Json/Query, but a malformed body or query string renders the
// `{"error": …}` body like every other failure instead of axum's plain-text
// rejection. The rejection's own status (400/415/422) is kept.

pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

pub struct Query<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        Self {
            status: rej.status(),
            message: rej.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rej: QueryRejection) -> Self {
        Self {
            status: rej.status(),
            message: rej.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let e = ApiError::not_found("eoi");
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.message, "eoi not found");
    }

    #[test]
    fn row_not_found_becomes_404() {
        let e: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_errors_become_500_with_message() {
        let e = internal_error("boom");
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.message, "internal error: boom");
    }
}
