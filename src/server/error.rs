use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::MiniAppError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl MiniAppError {
    pub fn status(&self) -> StatusCode {
        match self {
            MiniAppError::MissingParameter(_)
            | MiniAppError::MalformedParameter(..) => StatusCode::BAD_REQUEST,
            MiniAppError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to show to a caller. Internal details only
    /// travel in the log, except for render failures which carry them
    /// as `detail`.
    fn public_message(&self) -> String {
        match self {
            MiniAppError::MissingParameter(_)
            | MiniAppError::MalformedParameter(..) => return self.to_string(),
            MiniAppError::NotFound => "User not found",
            MiniAppError::UpstreamConfig => "Server configuration error",
            MiniAppError::Render(_) => "Failed to generate the image",
            _ => "Failed to fetch score",
        }
        .to_string()
    }
}

impl IntoResponse for MiniAppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        }
        let body = ErrorBody {
            error: self.public_message(),
            detail: match self {
                MiniAppError::Render(detail) => Some(detail),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MiniAppError::MissingParameter("FID"), 400, "FID is required")]
    #[case(MiniAppError::NotFound, 404, "User not found")]
    #[case(MiniAppError::UpstreamConfig, 500, "Server configuration error")]
    #[case(
        MiniAppError::Upstream("Service Unavailable".into()),
        500,
        "Failed to fetch score"
    )]
    #[case(MiniAppError::Parse, 500, "Failed to fetch score")]
    fn maps_errors_to_statuses(
        #[case] error: MiniAppError,
        #[case] status: u16,
        #[case] message: &str,
    ) {
        assert_eq!(error.status().as_u16(), status);
        assert_eq!(error.public_message(), message);
    }
}
