use axum::{
  extract::{Json, State},
  response::Json as JsonResponse,
  routing::{post, Router},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  email::{Attachment, DeliveryResult, SendMailOptions},
  state::{AppState, SharedAppState},
  AppError,
};

const TEST_EMAIL_RECIPIENT: &str = "test@example.com";

/// A 1x1 transparent PNG.
const TEST_EMAIL_IMAGE: &[u8] = &[
  0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
  0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49,
  0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00,
  0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TestEmailRequest {
  #[serde(default)]
  pub to: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TestEmailResponse {
  pub success: bool,
  pub message: String,
  pub info: DeliveryResult,
}

pub fn mail_routes() -> Router<SharedAppState> {
  Router::new()
    .route("/mail", post(send_mail_handler))
    .route("/test-email", post(test_email_handler))
}

pub async fn send_mail_handler(
  State(state): State<SharedAppState>,
  Json(payload): Json<SendMailOptions>,
) -> Result<JsonResponse<DeliveryResult>, AppError> {
  state.send_mail(payload).await.map(JsonResponse).map_err(Into::into)
}

/// Sends the bundled `welcome` template with sample data and a small image.
pub async fn test_email_handler(
  State(state): State<SharedAppState>,
  Json(payload): Json<TestEmailRequest>,
) -> Result<JsonResponse<TestEmailResponse>, AppError> {
  let to = payload.to.unwrap_or_else(|| TEST_EMAIL_RECIPIENT.to_string());
  let context = json!({
    "userName": "Test User",
    "activationLink": "https://example.com/activate",
  });

  let options = SendMailOptions::new(to.as_str(), "Test email from arpix-email-sender")
    .template("welcome", context.as_object().cloned())
    .attachment(Attachment::from_content("test.png", TEST_EMAIL_IMAGE));

  let info = state.send_mail(options).await.map_err(|e| {
    tracing::error!("Test email failed: {}", e);
    AppError::from(e)
  })?;

  Ok(JsonResponse(TestEmailResponse {
    success: true,
    message: "Email sent.".to_string(),
    info,
  }))
}
