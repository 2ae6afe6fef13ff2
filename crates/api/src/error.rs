use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error;

pub type ApiResult<T = ()> = Result<T, ApiError>;

const INTERNAL_ERROR_MESSAGE: &str = "an internal server error occurred";

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Invalid credentials")]
  InvalidCredentials(),
  #[error("{0}")]
  Unauthenticated(String),
  #[error("{0}")]
  Forbidden(String),
  #[error("User with email `{0}` already exists")]
  UserAlreadyExist(String),
  #[error("You have already submitted a proposal for project `{0}`")]
  AlreadyApplied(String),
  #[error("The {0} review has already been left")]
  AlreadyReviewed(String),
  #[error("Project `{0}` was modified concurrently, reload it and try again")]
  ConcurrentModification(String),
  #[error("Entity `{0}` is not found")]
  ResourceNotFound(String),
  #[error("{0}")]
  InvalidState(String),
  #[error("{0}")]
  InvalidInput(String),
  #[error(transparent)]
  JsonRejection(JsonRejection),
  #[error(transparent)]
  InvalidInputError(#[from] validator::ValidationErrors),
  #[error("Database error: {0}")]
  DatabaseError(#[from] SqlxError),
  #[error("Document encoding error: {0}")]
  DocumentError(#[from] serde_json::Error),
  #[error("{}", INTERNAL_ERROR_MESSAGE)]
  Anyhow(#[from] anyhow::Error),
}

/// Debug report of an internal failure, attached to the response so the
/// development-only middleware can surface it.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub String);

impl ApiError {
  pub fn kind(&self) -> &'static str {
    use ApiError::*;

    match self {
      JsonRejection(_) | InvalidInputError(_) | InvalidInput(_) => "VALIDATION_ERROR",
      InvalidCredentials() | Unauthenticated(_) => "AUTHENTICATION_ERROR",
      Forbidden(_) => "AUTHORIZATION_ERROR",
      ResourceNotFound(_) => "NOT_FOUND",
      UserAlreadyExist(_) | AlreadyApplied(_) | AlreadyReviewed(_) | ConcurrentModification(_) => "CONFLICT",
      InvalidState(_) => "STATE_ERROR",
      DatabaseError(_) | DocumentError(_) | Anyhow(_) => "INTERNAL_SERVER_ERROR",
    }
  }

  pub fn status_code(&self) -> StatusCode {
    use ApiError::*;

    match self {
      JsonRejection(_) | InvalidInputError(_) | InvalidInput(_) | InvalidState(_) => StatusCode::BAD_REQUEST,
      InvalidCredentials() | Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      Forbidden(_) => StatusCode::FORBIDDEN,
      ResourceNotFound(_) => StatusCode::NOT_FOUND,
      UserAlreadyExist(_) | AlreadyApplied(_) | AlreadyReviewed(_) | ConcurrentModification(_) => {
        StatusCode::CONFLICT
      },
      DatabaseError(_) | DocumentError(_) | Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn response(self) -> (StatusCode, AppResponseError, Option<ErrorReport>) {
    use ApiError::*;

    let kind = self.kind();
    let status_code = self.status_code();

    let (message, details, report) = match self {
      JsonRejection(rejection) => (
        rejection.body_text(),
        vec![(rejection.status().to_string(), vec![rejection.body_text()])],
        None,
      ),
      InvalidInputError(ref err) => (
        self.to_string(),
        err
          .field_errors()
          .into_iter()
          .map(|(p, e)| {
            (
              p.to_string(),
              e.iter().map(|err| err.code.to_string()).collect::<Vec<String>>(),
            )
          })
          .collect(),
        None,
      ),
      DatabaseError(ref e) => {
        tracing::error!("Database error: {:?}", e);
        (INTERNAL_ERROR_MESSAGE.to_string(), vec![], Some(ErrorReport(format!("{e:?}"))))
      },
      DocumentError(ref e) => {
        tracing::error!("Document encoding error: {:?}", e);
        (INTERNAL_ERROR_MESSAGE.to_string(), vec![], Some(ErrorReport(format!("{e:?}"))))
      },
      Anyhow(ref e) => {
        tracing::error!("Generic error: {:?}", e);
        (INTERNAL_ERROR_MESSAGE.to_string(), vec![], Some(ErrorReport(format!("{e:?}"))))
      },
      other => (other.to_string(), vec![], None),
    };

    (status_code, AppResponseError::new(kind, message, None, details), report)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status_code, body, report) = self.response();
    let mut response = (status_code, Json(body)).into_response();
    if let Some(report) = report {
      response.extensions_mut().insert(report);
    }
    response
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::JsonRejection(rejection)
  }
}

/// Development-only layer: replaces the generic body of internal errors with
/// one carrying the debug report.
pub async fn expose_error_reports(req: Request, next: Next) -> Response {
  let mut response = next.run(req).await;

  let Some(ErrorReport(report)) = response.extensions_mut().remove::<ErrorReport>() else {
    return response;
  };

  let body = AppResponseError::new(
    "INTERNAL_SERVER_ERROR",
    INTERNAL_ERROR_MESSAGE,
    None,
    vec![("report".to_string(), vec![report])],
  );

  (response.status(), Json(body)).into_response()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppResponseError {
  pub kind: String,
  pub error_message: String,
  pub code: Option<i32>,
  pub details: Vec<(String, Vec<String>)>,
}

impl AppResponseError {
  pub fn new(
    kind: impl Into<String>,
    message: impl Into<String>,
    code: Option<i32>,
    details: Vec<(String, Vec<String>)>,
  ) -> Self {
    Self {
      kind: kind.into(),
      error_message: message.into(),
      code,
      details,
    }
  }
}
