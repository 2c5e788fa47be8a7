use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dealer_agent::DecisionError;
use dealer_core::DealerError;

// ---------------------------------------------------------------------------
// Sentinels for explicit status codes
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain.
#[derive(Debug)]
struct StatusError(StatusCode, String);

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.1)
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Bodies are `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::BAD_REQUEST, msg.into()).into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::CONFLICT, msg.into()).into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::SERVICE_UNAVAILABLE, msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(s) = self.0.downcast_ref::<StatusError>() {
            s.0
        } else if let Some(e) = self.0.downcast_ref::<DealerError>() {
            match e {
                // The dashboard is up before `dealer generate` has run.
                DealerError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
                DealerError::VehicleNotFound(_) | DealerError::InquiryNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                DealerError::InvalidConfig(_) | DealerError::Yaml(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DealerError::Persistence { .. }
                | DealerError::Csv { .. }
                | DealerError::Io(_)
                | DealerError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else if let Some(e) = self.0.downcast_ref::<DecisionError>() {
            match e {
                DecisionError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                DecisionError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                DecisionError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!("request failed: {:#}", self.0);
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_initialized_maps_to_503() {
        let err = AppError(DealerError::NotInitialized("data".into()).into());
        assert_eq!(status(err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn vehicle_not_found_maps_to_404() {
        let err = AppError(DealerError::VehicleNotFound("VIN9".into()).into());
        assert_eq!(status(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_config_maps_to_422() {
        let err = AppError(DealerError::InvalidConfig("min_margin".into()).into());
        assert_eq!(status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn persistence_maps_to_500() {
        let err = AppError(
            DealerError::persistence(
                std::path::Path::new("logs/actions.jsonl"),
                std::io::Error::other("disk full"),
            )
            .into(),
        );
        assert_eq!(status(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn explicit_constructors_keep_their_status() {
        assert_eq!(status(AppError::conflict("busy")), StatusCode::CONFLICT);
        assert_eq!(
            status(AppError::unavailable("no scheduler")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(AppError::bad_request("limit")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn reasoning_failures_map_by_kind() {
        let upstream = AppError(DecisionError::UpstreamUnavailable("timed out".into()).into());
        assert_eq!(status(upstream), StatusCode::BAD_GATEWAY);
        let config = AppError(DecisionError::Configuration("no key".into()).into());
        assert_eq!(status(config), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_errors_map_to_500() {
        assert_eq!(
            status(AppError(anyhow::anyhow!("unexpected"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
