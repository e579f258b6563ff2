use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use crate::auth::AuthError;
use crate::counter::CounterError;
use crate::database::DatabaseError;
use crate::stats::StatsError;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("{source}"))]
    Unauthenticated { source: AuthError },

    #[snafu(display("prompt `{id}` not found"))]
    PromptNotFound {
        id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("user `{email}` not found"))]
    OwnerNotFound {
        email: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("expected a JSON object"))]
    InvalidBlob {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{source}"))]
    Counter { source: CounterError },

    #[snafu(display("{source}"))]
    Stats { source: StatsError },

    #[snafu(display("database fault: {source}"))]
    Store {
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::PromptNotFound { .. } | ApiError::OwnerNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InvalidBlob { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Counter { source } => match source {
                CounterError::UnknownPrompt { .. } => StatusCode::NOT_FOUND,
                CounterError::CounterStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Stats { source } => match source {
                StatsError::UnknownOwner { .. } => StatusCode::NOT_FOUND,
                StatsError::StatsStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CounterError> for ApiError {
    fn from(source: CounterError) -> Self {
        ApiError::Counter { source }
    }
}

impl From<StatsError> for ApiError {
    fn from(source: StatsError) -> Self {
        ApiError::Stats { source }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // faults stay in the log, the caller only learns that something went wrong
        let error = if status.is_server_error() {
            tracing::error!(error = ?self, "request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}
