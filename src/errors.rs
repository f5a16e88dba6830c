use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// The registry has no record for the requested resource.
    NotFound(String),
    /// The registry rejected our credentials.
    Unauthorized(String),
    /// The registry is throttling us.
    RateLimited(String),
    /// Any other upstream failure. `status` is `None` for transport or decode errors.
    UpstreamError {
        /// HTTP status returned by the upstream service, if one was received.
        status: Option<u16>,
        /// Human-readable description.
        message: String,
    },
    /// Bad request error (invalid input).
    BadRequest(String),
    /// The language model could not produce a usable analysis.
    ///
    /// Only raised inside the analysis service, which always replaces it with
    /// the fallback heuristic.
    AnalysisUnavailable(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Maps an upstream non-success status to the error taxonomy.
    pub fn from_upstream_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => AppError::NotFound(message),
            401 => AppError::Unauthorized(message),
            429 => AppError::RateLimited(message),
            _ => AppError::UpstreamError {
                status: Some(status),
                message,
            },
        }
    }

    /// HTTP status this error is served with. Context wrappers defer to their source.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized(_)
            | AppError::UpstreamError { .. }
            | AppError::AnalysisUnavailable(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::WithContext { source, .. } => source.status_code(),
        }
    }

    /// Message exposed to API callers.
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::RateLimited(msg) => {
                msg.clone()
            }
            AppError::Unauthorized(_) => {
                "Company registry rejected the configured API key".to_string()
            }
            AppError::UpstreamError {
                status: Some(status),
                ..
            } => format!("Company registry error: {}", status),
            AppError::UpstreamError { status: None, .. } => {
                "Company registry unavailable".to_string()
            }
            AppError::AnalysisUnavailable(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
            AppError::WithContext { source, .. } => source.public_message(),
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppError::UpstreamError {
                status: Some(status),
                message,
            } => write!(f, "Upstream error ({}): {}", status, message),
            AppError::UpstreamError {
                status: None,
                message,
            } => write!(f, "Upstream error: {}", message),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::AnalysisUnavailable(msg) => write!(f, "Analysis unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// The status comes from the variant, and the body is `{"error": message}`.
    /// Upstream details are logged but not echoed to the caller.
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::NotFound(_) | AppError::BadRequest(_) => {
                tracing::debug!("{}", self);
            }
            AppError::RateLimited(_) => tracing::warn!("{}", self),
            AppError::Unauthorized(_) => {
                tracing::error!("Registry credentials rejected: {}", self);
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
            }
            _ => tracing::error!("{}", self),
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamError {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        assert!(matches!(
            AppError::from_upstream_status(404, "x"),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from_upstream_status(401, "x"),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            AppError::from_upstream_status(429, "x"),
            AppError::RateLimited(_)
        ));
        assert!(matches!(
            AppError::from_upstream_status(503, "x"),
            AppError::UpstreamError {
                status: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("a".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RateLimited("a".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::BadRequest("a".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("a".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_keeps_source_status() {
        let result: Result<(), AppError> = Err(AppError::NotFound("Company not found".into()));
        let err = result.context("Fetching profile").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Fetching profile: Not found: Company not found");
        assert_eq!(err.public_message(), "Company not found");
    }

    #[test]
    fn test_upstream_details_not_exposed() {
        let err = AppError::UpstreamError {
            status: Some(502),
            message: "secret upstream body".into(),
        };
        assert_eq!(err.public_message(), "Company registry error: 502");
    }
}
