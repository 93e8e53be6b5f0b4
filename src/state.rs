use std::sync::Arc;

use crate::email::{DeliveryResult, MailError, MailSender, SendMailOptions, SenderInstance};

pub trait AppState: Clone + Send + Sync + 'static {
  fn send_mail(
    &self,
    options: SendMailOptions,
  ) -> impl std::future::Future<Output = Result<DeliveryResult, MailError>> + Send;
}

#[derive(Clone)]
pub struct SharedAppState {
  pub mail_sender: Arc<MailSender>,
}

impl SharedAppState {
  pub fn new(mail_sender: Arc<MailSender>) -> Self {
    Self { mail_sender }
  }
}

impl AppState for SharedAppState {
  async fn send_mail(&self, options: SendMailOptions) -> Result<DeliveryResult, MailError> {
    SenderInstance::send(self.mail_sender.as_ref(), options).await
  }
}
