//! Templated email sending
//!
//! Options are read once, the transport client is built lazily by the
//! `MailSender` that owns it, and every send optionally renders a
//! handlebars template from disk before handing the message to lettre.

mod error;
mod service;
mod template;
mod transport;
mod types;

pub use error::{BoxError, MailError, TemplateError};
pub use service::{MailSender, SenderInstance};
pub use template::{TemplateRenderer, TEMPLATE_EXTENSION};
#[cfg(test)]
pub use transport::MockMailTransport;
pub use transport::{build_message, smtp_options, MailTransport, SmtpMailTransport, SmtpTransportFactory, TransportFactory};
pub use types::{Attachment, DeliveryResult, Envelope, MailPayload, Recipients, SendMailOptions};
