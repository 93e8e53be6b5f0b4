use std::{collections::BTreeMap, path::PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lettre::message::{header::HeaderName, Mailbox};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

/// Headers the message builder owns; they cannot be passed through.
const RESERVED_HEADERS: [&str; 11] = [
  "from",
  "to",
  "cc",
  "bcc",
  "subject",
  "reply-to",
  "message-id",
  "date",
  "content-type",
  "content-transfer-encoding",
  "mime-version",
];

/// One address or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
  One(String),
  Many(Vec<String>),
}

impl Recipients {
  pub fn as_slice(&self) -> &[String] {
    match self {
      Recipients::One(address) => std::slice::from_ref(address),
      Recipients::Many(addresses) => addresses,
    }
  }
}

impl Default for Recipients {
  fn default() -> Self {
    Recipients::Many(Vec::new())
  }
}

impl From<&str> for Recipients {
  fn from(address: &str) -> Self {
    Recipients::One(address.to_string())
  }
}

impl From<Vec<String>> for Recipients {
  fn from(addresses: Vec<String>) -> Self {
    Recipients::Many(addresses)
  }
}

/// A file attached to the message.
///
/// Over JSON, `content` is either a byte array or a string. A string is taken
/// as UTF-8 text unless `encoding` is `"base64"`. Serializing always writes
/// base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttachmentRepr", into = "AttachmentRepr")]
pub struct Attachment {
  pub filename: String,
  /// Inline body, sent as-is.
  pub content: Option<Vec<u8>>,
  /// File read when the message is built. Ignored when `content` is set.
  pub path: Option<PathBuf>,
  pub content_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AttachmentRepr {
  filename: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  content: Option<ContentRepr>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  encoding: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  content_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContentRepr {
  Text(String),
  Bytes(Vec<u8>),
}

impl TryFrom<AttachmentRepr> for Attachment {
  type Error = String;

  fn try_from(repr: AttachmentRepr) -> Result<Self, Self::Error> {
    let content = match (repr.content, repr.encoding.as_deref()) {
      (None, _) => None,
      (Some(ContentRepr::Bytes(bytes)), _) => Some(bytes),
      (Some(ContentRepr::Text(text)), None | Some("utf8") | Some("utf-8")) => Some(text.into_bytes()),
      (Some(ContentRepr::Text(text)), Some("base64")) => Some(
        BASE64
          .decode(text.as_bytes())
          .map_err(|e| format!("invalid base64 content for attachment {}: {}", repr.filename, e))?,
      ),
      (Some(ContentRepr::Text(_)), Some(other)) => {
        return Err(format!("unsupported attachment encoding: {}", other));
      }
    };

    Ok(Attachment {
      filename: repr.filename,
      content,
      path: repr.path,
      content_type: repr.content_type,
    })
  }
}

impl From<Attachment> for AttachmentRepr {
  fn from(attachment: Attachment) -> Self {
    let encoding = attachment.content.as_ref().map(|_| "base64".to_string());
    AttachmentRepr {
      filename: attachment.filename,
      content: attachment.content.map(|bytes| ContentRepr::Text(BASE64.encode(bytes))),
      encoding,
      path: attachment.path,
      content_type: attachment.content_type,
    }
  }
}

impl Attachment {
  pub fn from_content(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
    Attachment {
      filename: filename.into(),
      content: Some(content.into()),
      ..Default::default()
    }
  }

  pub fn from_path(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Attachment {
      filename: filename.into(),
      path: Some(path.into()),
      ..Default::default()
    }
  }

  /// Explicit content type, else guessed from the file name.
  pub fn resolved_content_type(&self) -> String {
    self.content_type.clone().unwrap_or_else(|| {
      mime_guess::from_path(&self.filename)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
    })
  }
}

/// Per-call message request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMailOptions {
  #[validate(custom(function = "validate_recipients"))]
  pub to: Recipients,
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub text: Option<String>,
  #[serde(default)]
  pub html: Option<String>,
  /// Template name without the `.hbs` extension.
  #[serde(default)]
  pub template: Option<String>,
  #[serde(default)]
  pub context: Option<Map<String, Value>>,
  #[serde(default)]
  pub attachments: Vec<Attachment>,
  /// Overrides the configured default sender.
  #[serde(default)]
  #[validate(custom(function = "validate_mailbox"))]
  pub from: Option<String>,
  #[serde(default)]
  #[validate(custom(function = "validate_mailboxes"))]
  pub cc: Vec<String>,
  #[serde(default)]
  #[validate(custom(function = "validate_mailboxes"))]
  pub bcc: Vec<String>,
  #[serde(default)]
  #[validate(custom(function = "validate_mailbox"))]
  pub reply_to: Option<String>,
  /// Extra headers passed through to the transport untouched.
  #[serde(default)]
  #[validate(custom(function = "validate_headers"))]
  pub headers: BTreeMap<String, String>,
}

impl SendMailOptions {
  pub fn new(to: impl Into<Recipients>, subject: impl Into<String>) -> Self {
    SendMailOptions {
      to: to.into(),
      subject: subject.into(),
      ..Default::default()
    }
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.text = Some(text.into());
    self
  }

  pub fn html(mut self, html: impl Into<String>) -> Self {
    self.html = Some(html.into());
    self
  }

  pub fn template(mut self, name: impl Into<String>, context: Option<Map<String, Value>>) -> Self {
    self.template = Some(name.into());
    self.context = context;
    self
  }

  pub fn from(mut self, from: impl Into<String>) -> Self {
    self.from = Some(from.into());
    self
  }

  pub fn attachment(mut self, attachment: Attachment) -> Self {
    self.attachments.push(attachment);
    self
  }
}

fn validate_recipients(recipients: &Recipients) -> Result<(), ValidationError> {
  if recipients.as_slice().is_empty() {
    return Err(ValidationError::new("at least one recipient is required"));
  }
  validate_mailboxes(recipients.as_slice())
}

fn validate_mailboxes(addresses: &[String]) -> Result<(), ValidationError> {
  addresses.iter().try_for_each(|address| validate_mailbox(address))
}

fn validate_mailbox(address: &str) -> Result<(), ValidationError> {
  address
    .parse::<Mailbox>()
    .map(|_| ())
    .map_err(|_| ValidationError::new("invalid email address"))
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ValidationError> {
  for (name, value) in headers {
    if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
      return Err(ValidationError::new("reserved header"));
    }
    if HeaderName::new_from_ascii(name.clone()).is_err() {
      return Err(ValidationError::new("invalid header name"));
    }
    if value.contains(['\r', '\n']) {
      return Err(ValidationError::new("invalid header value"));
    }
  }
  Ok(())
}

/// Fully resolved message handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MailPayload {
  pub message_id: String,
  pub from: Mailbox,
  pub to: Vec<Mailbox>,
  pub cc: Vec<Mailbox>,
  pub bcc: Vec<Mailbox>,
  pub reply_to: Option<Mailbox>,
  pub subject: String,
  pub text: Option<String>,
  pub html: Option<String>,
  pub attachments: Vec<Attachment>,
  pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
  pub from: Option<String>,
  pub to: Vec<String>,
}

/// What the transport reports back for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
  pub message_id: String,
  pub envelope: Envelope,
  pub accepted: Vec<String>,
  pub rejected: Vec<String>,
  /// Final server reply, e.g. `250 OK`.
  pub response: String,
}
