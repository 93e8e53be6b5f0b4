use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use tokio::sync::OnceCell;
use uuid::Uuid;
use validator::Validate;

use crate::{
  config::{ModuleOptions, MODULE_NAME},
  email::{
    error::MailError,
    template::TemplateRenderer,
    transport::{MailTransport, SmtpTransportFactory, TransportFactory},
    types::{DeliveryResult, MailPayload, SendMailOptions},
  },
};

/// The capability handed to request handlers.
#[async_trait]
pub trait SenderInstance: Send + Sync {
  async fn send(&self, options: SendMailOptions) -> Result<DeliveryResult, MailError>;
}

/// Owns the module options and the lazily built transport client.
///
/// The client is created at most once per `MailSender`; a failed attempt
/// leaves the slot empty so the next call reports the same error.
pub struct MailSender {
  options: ModuleOptions,
  factory: Box<dyn TransportFactory>,
  transport: OnceCell<Arc<dyn MailTransport>>,
  renderer: TemplateRenderer,
}

impl MailSender {
  pub fn new(options: ModuleOptions) -> Self {
    Self::with_factory(options, SmtpTransportFactory)
  }

  pub fn with_factory(options: ModuleOptions, factory: impl TransportFactory + 'static) -> Self {
    let renderer = TemplateRenderer::new(options.templates_dir());
    MailSender {
      options,
      factory: Box::new(factory),
      transport: OnceCell::new(),
      renderer,
    }
  }

  pub fn options(&self) -> &ModuleOptions {
    &self.options
  }

  /// Builds the transport client up front instead of on the first send.
  pub async fn init(&self) -> Result<(), MailError> {
    self.transport().await.map(|_| ())
  }

  pub async fn transport(&self) -> Result<Arc<dyn MailTransport>, MailError> {
    self
      .transport
      .get_or_try_init(|| async { self.factory.create(&self.options) })
      .await
      .cloned()
  }

  pub async fn send(&self, options: SendMailOptions) -> Result<DeliveryResult, MailError> {
    let transport = self.transport().await?;

    options
      .validate()
      .map_err(|e| MailError::validation(format!("Invalid mail options: {}", e)))?;

    let payload = self.build_payload(options).await?;
    let message_id = payload.message_id.clone();

    match transport.send(payload).await {
      Ok(info) => {
        tracing::info!("[{}] Mail sent: {}", MODULE_NAME, info.message_id);
        Ok(info)
      }
      Err(source) => {
        tracing::error!("[{}] Error sending mail {}: {}", MODULE_NAME, message_id, source);
        Err(MailError::Delivery { source })
      }
    }
  }

  async fn build_payload(&self, options: SendMailOptions) -> Result<MailPayload, MailError> {
    let mut html = options.html.filter(|h| !h.is_empty());
    let text = options.text.filter(|t| !t.is_empty());

    match (&options.template, &options.context) {
      (Some(template), Some(context)) => {
        html = Some(self.renderer.render(template, context).await?).filter(|h| !h.is_empty());
      }
      (Some(template), None) => {
        tracing::warn!(
          "[{}] Template '{}' specified but 'context' not provided.",
          MODULE_NAME,
          template
        );
      }
      _ => {}
    }

    let from = match options.from.as_deref() {
      Some(from) => parse_mailbox(from)?,
      None => self.default_from()?,
    };

    if text.is_none() && html.is_none() {
      return Err(MailError::validation(
        "Mail content required (text, html or template with context).",
      ));
    }

    Ok(MailPayload {
      message_id: format!("<{}@{}>", Uuid::new_v4(), from.email.domain()),
      from,
      to: parse_mailboxes(options.to.as_slice())?,
      cc: parse_mailboxes(&options.cc)?,
      bcc: parse_mailboxes(&options.bcc)?,
      reply_to: options.reply_to.as_deref().map(parse_mailbox).transpose()?,
      subject: options.subject,
      text,
      html,
      attachments: options.attachments,
      headers: options.headers.into_iter().collect(),
    })
  }

  /// The configured sender; a malformed value is a server misconfiguration.
  fn default_from(&self) -> Result<Mailbox, MailError> {
    let default_from = self
      .options
      .default_from
      .as_deref()
      .ok_or_else(|| MailError::validation("Sender required ('from' or 'defaultFrom')."))?;
    default_from
      .parse()
      .map_err(|e| MailError::config(format!("Invalid defaultFrom '{}': {}", default_from, e)))
  }
}

#[async_trait]
impl SenderInstance for MailSender {
  async fn send(&self, options: SendMailOptions) -> Result<DeliveryResult, MailError> {
    MailSender::send(self, options).await
  }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
  address
    .parse()
    .map_err(|e| MailError::validation(format!("Invalid address '{}': {}", address, e)))
}

fn parse_mailboxes(addresses: &[String]) -> Result<Vec<Mailbox>, MailError> {
  addresses.iter().map(|a| parse_mailbox(a)).collect()
}
