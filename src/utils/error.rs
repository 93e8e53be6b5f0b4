use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;

use crate::email::MailError;

#[derive(Debug)]
pub struct AppError {
  pub status_code: StatusCode,
  pub message: String,
}

impl AppError {
  pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
    Self {
      status_code,
      message: message.into(),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = Json(json!({
      "error": self.message,
      "status_code": self.status_code.as_u16(),
    }));

    (self.status_code, body).into_response()
  }
}

impl From<MailError> for AppError {
  fn from(error: MailError) -> Self {
    let status_code = error.status_code();
    if status_code.is_server_error() {
      tracing::error!("Mail error: {:?}", error);
    }
    AppError::new(status_code, error.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mail_validation_error_maps_to_bad_request() {
    let err: AppError = MailError::validation("Mail content required").into();
    assert_eq!(err.status_code, StatusCode::BAD_REQUEST);
    assert!(err.message.contains("Mail content required"));
  }

  #[test]
  fn test_mail_delivery_error_hides_cause() {
    let err: AppError = MailError::Delivery {
      source: "535 authentication failed".into(),
    }
    .into();
    assert_eq!(err.status_code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message, "Error sending email.");
  }
}
