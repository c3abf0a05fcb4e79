use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use stockpace::ReportError;

/// Request-boundary error. Domain failures are converted here into the
/// structured failure envelope; nothing below the handler layer ever
/// reaches the client as a raw fault.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    database: Option<String>,
    message: String,
    trace: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Bad request: {}", msg);
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            database: None,
            message: msg,
            trace: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("Internal error: {}", msg);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            database: None,
            message: msg,
            trace: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        let database = err.tenant().map(str::to_string);
        match err {
            ReportError::UnknownTenant { .. } => {
                tracing::warn!("Unknown tenant: {}", err);
                Self {
                    status: StatusCode::NOT_FOUND,
                    code: "UNKNOWN_TENANT",
                    database,
                    message: err.to_string(),
                    trace: None,
                }
            }
            ReportError::DataSource { ref source, .. } => {
                tracing::error!("Data source error: {:?}", source);
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    code: "DATA_SOURCE_ERROR",
                    database,
                    message: err.to_string(),
                    trace: Some(format!("{source:?}")),
                }
            }
            ReportError::Computation { .. } => {
                tracing::error!("Computation error: {}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "COMPUTATION_ERROR",
                    database,
                    message: err.to_string(),
                    trace: None,
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct FailureBody<'a> {
            status: &'a str,
            code: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            database: Option<&'a str>,
            error: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            trace: Option<&'a str>,
        }

        (
            self.status,
            Json(FailureBody {
                status: "Error",
                code: self.code,
                database: self.database.as_deref(),
                error: &self.message,
                trace: self.trace.as_deref(),
            }),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.code)
    }
}

impl std::error::Error for ApiError {}
