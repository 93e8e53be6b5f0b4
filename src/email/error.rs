use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MailError {
  /// Missing or invalid transport selection or sub-configuration.
  #[error("[arpix-email-sender] {0}")]
  Config(String),

  #[error("Error processing mail template: {template}")]
  Template {
    template: String,
    #[source]
    source: TemplateError,
  },

  #[error("[arpix-email-sender] {0}")]
  Validation(String),

  #[error("Error sending email.")]
  Delivery {
    #[source]
    source: BoxError,
  },
}

/// Underlying cause of a [`MailError::Template`].
#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("invalid template name '{0}'")]
  InvalidName(String),

  #[error("failed to read template file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to render template file {}: {source}", path.display())]
  Render {
    path: PathBuf,
    #[source]
    source: Box<handlebars::RenderError>,
  },
}

impl MailError {
  pub fn config(message: impl Into<String>) -> Self {
    MailError::Config(message.into())
  }

  pub fn validation(message: impl Into<String>) -> Self {
    MailError::Validation(message.into())
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      MailError::Validation(_) => StatusCode::BAD_REQUEST,
      MailError::Config(_) | MailError::Template { .. } | MailError::Delivery { .. } => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}
