use std::sync::Arc;

use crate::{
  config::{runtime_config_from_env, ModuleOptions},
  email::MailSender,
};

pub mod error;

/// Reads the module options from the environment and builds the shared
/// sender. The transport is initialized eagerly; a failure is only logged so
/// the server still starts and each send reports the configuration error.
pub async fn init_mail_sender() -> Arc<MailSender> {
  let options = ModuleOptions::from_runtime_config(&runtime_config_from_env());
  options.setup_check();

  let sender = MailSender::new(options);
  if let Err(e) = sender.init().await {
    tracing::warn!("Mail transport not initialized: {}", e);
  }

  Arc::new(sender)
}
