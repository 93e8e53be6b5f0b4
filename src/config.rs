//! Module configuration.
//!
//! The embedding application owns the runtime configuration as a JSON
//! document; this module only reads its own section out of it.

use std::{
  env,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MODULE_NAME: &str = "arpix-email-sender";
pub const CONFIG_KEY: &str = "arpixEmailSender";
pub const DEFAULT_TEMPLATES_DIR: &str = "server/emails/templates";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleOptions {
  /// Transport selector. Only `smtp` is implemented.
  pub transport: Option<String>,
  /// Sender used when a message does not carry its own `from`.
  pub default_from: Option<String>,
  pub smtp: Option<SmtpOptions>,
  pub templates: TemplatesOptions,
  /// Project root the template directory is resolved against.
  pub root_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmtpOptions {
  pub host: Option<String>,
  pub port: u16,
  /// Implicit TLS instead of STARTTLS.
  pub secure: bool,
  pub auth: Option<SmtpAuth>,
}

impl Default for SmtpOptions {
  fn default() -> Self {
    SmtpOptions {
      host: None,
      port: DEFAULT_SMTP_PORT,
      secure: false,
      auth: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpAuth {
  pub user: String,
  pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesOptions {
  pub dir: String,
}

impl Default for TemplatesOptions {
  fn default() -> Self {
    TemplatesOptions {
      dir: DEFAULT_TEMPLATES_DIR.to_string(),
    }
  }
}

impl ModuleOptions {
  /// Reads the module section out of the host runtime configuration.
  ///
  /// A missing or malformed section yields the empty-shaped default; the
  /// transport factory rejects it later.
  pub fn from_runtime_config(runtime_config: &Value) -> Self {
    let Some(section) = runtime_config.get(CONFIG_KEY) else {
      tracing::warn!("[{}] Configuration key '{}' not found", MODULE_NAME, CONFIG_KEY);
      return ModuleOptions::default();
    };

    match serde_json::from_value(section.clone()) {
      Ok(options) => options,
      Err(e) => {
        tracing::warn!("[{}] Ignoring malformed '{}' section: {}", MODULE_NAME, CONFIG_KEY, e);
        ModuleOptions::default()
      }
    }
  }

  /// Setup-time check of the essential settings. Returns `false` (after a
  /// warning) when sending cannot work with these options.
  pub fn setup_check(&self) -> bool {
    let usable = match self.transport.as_deref() {
      None => false,
      Some("smtp") => self.smtp.is_some(),
      Some(_) => true,
    };

    if usable {
      tracing::info!(
        "[{}] Module set up with transport: {}",
        MODULE_NAME,
        self.transport.as_deref().unwrap_or_default()
      );
    } else {
      tracing::warn!(
        "[{}] The transport configuration ('transport' and 'smtp') is required. The module will not work.",
        MODULE_NAME
      );
    }

    usable
  }

  pub fn templates_dir(&self) -> PathBuf {
    let root = self
      .root_dir
      .clone()
      .or_else(|| env::current_dir().ok())
      .unwrap_or_else(|| PathBuf::from("."));
    root.join(Path::new(&self.templates.dir))
  }
}

/// Builds the runtime configuration document from `EMAIL_SENDER_*` variables,
/// the way an embedding application wires credentials in.
pub fn runtime_config_from_env() -> Value {
  let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

  let port = var("EMAIL_SENDER_SMTP_PORT")
    .and_then(|p| p.parse::<u16>().ok())
    .unwrap_or(DEFAULT_SMTP_PORT);
  let secure = var("EMAIL_SENDER_SMTP_SECURE")
    .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    .unwrap_or(false);

  let auth = match (var("EMAIL_SENDER_SMTP_USER"), var("EMAIL_SENDER_SMTP_PASS")) {
    (Some(user), Some(pass)) => json!({ "user": user, "pass": pass }),
    _ => Value::Null,
  };

  let mut section = json!({
    "transport": var("EMAIL_SENDER_TRANSPORT").unwrap_or_else(|| "smtp".to_string()),
    "defaultFrom": var("EMAIL_SENDER_DEFAULT_FROM"),
    "smtp": {
      "host": var("EMAIL_SENDER_SMTP_HOST"),
      "port": port,
      "secure": secure,
      "auth": auth,
    },
    "rootDir": var("EMAIL_SENDER_ROOT_DIR"),
  });

  if let Some(dir) = var("EMAIL_SENDER_TEMPLATES_DIR") {
    section["templates"] = json!({ "dir": dir });
  }

  json!({ CONFIG_KEY: section })
}
