use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
  message::{
    header::{ContentType, HeaderName, HeaderValue},
    Attachment as MimeAttachment, MultiPart, SinglePart,
  },
  transport::smtp::authentication::Credentials,
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
  config::{ModuleOptions, SmtpOptions},
  email::{
    error::{BoxError, MailError},
    types::{DeliveryResult, Envelope, MailPayload},
  },
};

/// Performs the network delivery of one resolved message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
  async fn send(&self, payload: MailPayload) -> Result<DeliveryResult, BoxError>;
}

/// Builds the transport client from module options.
pub trait TransportFactory: Send + Sync {
  fn create(&self, options: &ModuleOptions) -> Result<Arc<dyn MailTransport>, MailError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransportFactory;

impl TransportFactory for SmtpTransportFactory {
  fn create(&self, options: &ModuleOptions) -> Result<Arc<dyn MailTransport>, MailError> {
    let smtp = smtp_options(options)?;
    Ok(Arc::new(SmtpMailTransport::new(smtp)?))
  }
}

/// Picks the SMTP sub-configuration, rejecting every other transport kind.
pub fn smtp_options(options: &ModuleOptions) -> Result<&SmtpOptions, MailError> {
  match options.transport.as_deref() {
    None => Err(MailError::config("Mail transport not configured ('transport' is required).")),
    Some("smtp") => options
      .smtp
      .as_ref()
      .ok_or_else(|| MailError::config("Configuration SMTP required but not found.")),
    Some(other) => Err(MailError::config(format!("Invalid mail transport: {}", other))),
  }
}

pub struct SmtpMailTransport {
  host: String,
  port: u16,
  transporter: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
  /// Builds the client without opening a connection.
  pub fn new(smtp: &SmtpOptions) -> Result<Self, MailError> {
    let host = smtp
      .host
      .clone()
      .filter(|h| !h.is_empty())
      .ok_or_else(|| MailError::config("Configuration SMTP host required but not found."))?;

    let mut builder = if is_local_relay(&host) {
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
    } else if smtp.secure {
      AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
        .map_err(|e| MailError::config(format!("Invalid SMTP relay {}: {}", host, e)))?
    } else {
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
        .map_err(|e| MailError::config(format!("Invalid SMTP relay {}: {}", host, e)))?
    };

    builder = builder.port(smtp.port);
    if let Some(auth) = &smtp.auth {
      builder = builder.credentials(Credentials::new(auth.user.clone(), auth.pass.clone()));
    }

    tracing::debug!(host = %host, port = smtp.port, secure = smtp.secure, "SMTP transport created");

    Ok(SmtpMailTransport {
      host,
      port: smtp.port,
      transporter: builder.build(),
    })
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn port(&self) -> u16 {
    self.port
  }
}

fn is_local_relay(host: &str) -> bool {
  matches!(host, "localhost" | "mailhog" | "127.0.0.1")
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
  async fn send(&self, payload: MailPayload) -> Result<DeliveryResult, BoxError> {
    let message = build_message(&payload).await?;
    let envelope = message.envelope().clone();

    let response = self.transporter.send(message).await?;

    let accepted: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
    let reply = response.message().collect::<Vec<_>>().join(" ");

    Ok(DeliveryResult {
      message_id: payload.message_id,
      envelope: Envelope {
        from: envelope.from().map(ToString::to_string),
        to: accepted.clone(),
      },
      accepted,
      rejected: Vec::new(),
      response: format!("{} {}", response.code(), reply).trim_end().to_string(),
    })
  }
}

enum Body {
  Single(SinglePart),
  Alternative(MultiPart),
}

/// Converts a resolved payload into a lettre message, reading attachment
/// files from disk.
pub async fn build_message(payload: &MailPayload) -> Result<Message, BoxError> {
  let mut builder = Message::builder()
    .message_id(Some(payload.message_id.clone()))
    .from(payload.from.clone())
    .subject(payload.subject.clone());

  for mailbox in &payload.to {
    builder = builder.to(mailbox.clone());
  }
  for mailbox in &payload.cc {
    builder = builder.cc(mailbox.clone());
  }
  for mailbox in &payload.bcc {
    builder = builder.bcc(mailbox.clone());
  }
  if let Some(reply_to) = &payload.reply_to {
    builder = builder.reply_to(reply_to.clone());
  }
  for (name, value) in &payload.headers {
    let name = HeaderName::new_from_ascii(name.clone()).map_err(|_| format!("invalid header name {}", name))?;
    builder = builder.raw_header(HeaderValue::new(name, value.clone()));
  }

  let body = match (&payload.text, &payload.html) {
    (Some(text), Some(html)) => Body::Alternative(MultiPart::alternative_plain_html(text.clone(), html.clone())),
    (Some(text), None) => Body::Single(SinglePart::plain(text.clone())),
    (None, Some(html)) => Body::Single(SinglePart::html(html.clone())),
    (None, None) => return Err("message has no text or html body".into()),
  };

  if payload.attachments.is_empty() {
    let message = match body {
      Body::Single(part) => builder.singlepart(part)?,
      Body::Alternative(parts) => builder.multipart(parts)?,
    };
    return Ok(message);
  }

  let mut mixed = match body {
    Body::Single(part) => MultiPart::mixed().singlepart(part),
    Body::Alternative(parts) => MultiPart::mixed().multipart(parts),
  };

  for attachment in &payload.attachments {
    let data = match (&attachment.content, &attachment.path) {
      (Some(content), _) => content.clone(),
      (None, Some(path)) => tokio::fs::read(path)
        .await
        .map_err(|e| format!("failed to read attachment {}: {}", path.display(), e))?,
      (None, None) => return Err(format!("attachment {} has no content or path", attachment.filename).into()),
    };
    let content_type = ContentType::parse(&attachment.resolved_content_type())
      .map_err(|_| format!("invalid content type for attachment {}", attachment.filename))?;

    mixed = mixed.singlepart(MimeAttachment::new(attachment.filename.clone()).body(data, content_type));
  }

  Ok(builder.multipart(mixed)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SmtpAuth;
  use crate::email::types::Attachment;

  fn smtp_module_options(host: &str) -> ModuleOptions {
    ModuleOptions {
      transport: Some("smtp".to_string()),
      smtp: Some(SmtpOptions {
        host: Some(host.to_string()),
        port: 1025,
        secure: false,
        auth: Some(SmtpAuth {
          user: "test_user".to_string(),
          pass: "test_password".to_string(),
        }),
      }),
      ..Default::default()
    }
  }

  fn payload() -> MailPayload {
    MailPayload {
      message_id: "<abc@example.com>".to_string(),
      from: "App <noreply@example.com>".parse().unwrap(),
      to: vec!["ada@example.com".parse().unwrap()],
      cc: Vec::new(),
      bcc: Vec::new(),
      reply_to: None,
      subject: "Welcome".to_string(),
      text: Some("Hello Ada".to_string()),
      html: Some("<p>Hello Ada</p>".to_string()),
      attachments: Vec::new(),
      headers: vec![("X-Campaign".to_string(), "spring".to_string())],
    }
  }

  #[test]
  fn test_missing_transport_is_config_error() {
    let result = SmtpTransportFactory.create(&ModuleOptions::default());
    assert!(matches!(result, Err(MailError::Config(_))));
  }

  #[test]
  fn test_smtp_without_section_is_config_error() {
    let options = ModuleOptions {
      transport: Some("smtp".to_string()),
      ..Default::default()
    };
    let result = SmtpTransportFactory.create(&options);
    assert!(matches!(result, Err(MailError::Config(msg)) if msg.contains("SMTP required")));
  }

  #[test]
  fn test_unknown_transport_is_config_error() {
    let options = ModuleOptions {
      transport: Some("ses".to_string()),
      ..smtp_module_options("localhost")
    };
    let result = SmtpTransportFactory.create(&options);
    assert!(matches!(result, Err(MailError::Config(msg)) if msg == "Invalid mail transport: ses"));
  }

  #[test]
  fn test_smtp_without_host_is_config_error() {
    let options = ModuleOptions {
      transport: Some("smtp".to_string()),
      smtp: Some(SmtpOptions::default()),
      ..Default::default()
    };
    let result = SmtpTransportFactory.create(&options);
    assert!(matches!(result, Err(MailError::Config(msg)) if msg.contains("host")));
  }

  #[tokio::test]
  async fn test_smtp_transport_with_localhost() {
    let options = smtp_module_options("localhost");
    let transport = SmtpMailTransport::new(smtp_options(&options).unwrap()).unwrap();
    assert_eq!(transport.host(), "localhost");
    assert_eq!(transport.port(), 1025);
  }

  #[tokio::test]
  async fn test_smtp_transport_with_remote_relay() {
    let options = smtp_module_options("smtp.example.com");
    let transport = SmtpMailTransport::new(smtp_options(&options).unwrap()).unwrap();
    assert_eq!(transport.host(), "smtp.example.com");

    let mut secure = smtp_options(&options).unwrap().clone();
    secure.secure = true;
    secure.port = 465;
    let transport = SmtpMailTransport::new(&secure).unwrap();
    assert_eq!(transport.port(), 465);
  }

  #[tokio::test]
  async fn test_build_message_with_alternative_body() {
    let message = build_message(&payload()).await.unwrap();
    let raw = String::from_utf8(message.formatted()).unwrap();

    assert!(raw.contains("Message-ID: <abc@example.com>"));
    assert!(raw.contains("Subject: Welcome"));
    assert!(raw.contains("X-Campaign: spring"));
    assert!(raw.contains("multipart/alternative"));
    assert!(raw.contains("Hello Ada"));
    assert_eq!(message.envelope().to().len(), 1);
  }

  #[tokio::test]
  async fn test_build_message_with_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.csv");
    std::fs::write(&file, "a,b\n1,2\n").unwrap();

    let mut payload = payload();
    payload.html = None;
    payload.attachments = vec![
      Attachment::from_content("notes.txt", "remember"),
      Attachment::from_path("report.csv", &file),
      Attachment::from_content("pixel.png", vec![137u8, 80, 78, 71]),
    ];

    let message = build_message(&payload).await.unwrap();
    let raw = String::from_utf8(message.formatted()).unwrap();

    assert!(raw.contains("multipart/mixed"));
    assert!(raw.contains("filename=\"notes.txt\""));
    assert!(raw.contains("filename=\"report.csv\""));
    assert!(raw.contains("image/png"));
    assert!(raw.contains("iVBORw=="));
  }

  #[tokio::test]
  async fn test_build_message_fails_for_unreadable_attachment() {
    let mut payload = payload();
    payload.attachments = vec![Attachment::from_path("gone.png", "/nonexistent/gone.png")];

    let err = build_message(&payload).await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/gone.png"));
  }
}
