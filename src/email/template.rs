use std::path::{Component, Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{Map, Value};

use crate::email::error::{MailError, TemplateError};

pub const TEMPLATE_EXTENSION: &str = "hbs";

/// Renders `<dir>/<name>.hbs` with handlebars.
///
/// Nothing is cached: each call reads and compiles the file again, so edits
/// on disk show up on the next send.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
  dir: PathBuf,
}

impl TemplateRenderer {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    TemplateRenderer { dir: dir.into() }
  }

  pub fn template_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
    let relative = Path::new(name);
    let is_plain = !name.is_empty()
      && relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !is_plain {
      return Err(TemplateError::InvalidName(name.to_string()));
    }

    Ok(self.dir.join(format!("{}.{}", name, TEMPLATE_EXTENSION)))
  }

  pub async fn render(&self, name: &str, context: &Map<String, Value>) -> Result<String, MailError> {
    self.render_inner(name, context).await.map_err(|source| {
      tracing::error!("[arpix-email-sender] Error reading or compiling template {}: {}", name, source);
      MailError::Template {
        template: name.to_string(),
        source,
      }
    })
  }

  async fn render_inner(&self, name: &str, context: &Map<String, Value>) -> Result<String, TemplateError> {
    let path = self.template_path(name)?;

    let content = tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| TemplateError::Read {
        path: path.clone(),
        source,
      })?;

    Handlebars::new()
      .render_template(&content, context)
      .map_err(|source| TemplateError::Render {
        path,
        source: Box::new(source),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::error::Error;

  fn context(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object context")
  }

  #[tokio::test]
  async fn test_render_substitutes_context() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("welcome.hbs"),
      "<h1>Hello {{userName}}</h1><a href=\"{{activationLink}}\">Activate</a>",
    )
    .unwrap();

    let renderer = TemplateRenderer::new(dir.path());
    let html = renderer
      .render(
        "welcome",
        &context(json!({ "userName": "Ada", "activationLink": "https://example.com/activate" })),
      )
      .await
      .unwrap();

    assert_eq!(
      html,
      "<h1>Hello Ada</h1><a href=\"https://example.com/activate\">Activate</a>"
    );
  }

  #[tokio::test]
  async fn test_render_escapes_html() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("note.hbs"), "<p>{{body}}</p>").unwrap();

    let renderer = TemplateRenderer::new(dir.path());
    let html = renderer
      .render("note", &context(json!({ "body": "<script>" })))
      .await
      .unwrap();

    assert_eq!(html, "<p>&lt;script&gt;</p>");
  }

  #[tokio::test]
  async fn test_render_rereads_file_on_every_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.hbs");
    std::fs::write(&path, "Hi {{name}}").unwrap();

    let renderer = TemplateRenderer::new(dir.path());
    let ctx = context(json!({ "name": "Ada" }));
    assert_eq!(renderer.render("greeting", &ctx).await.unwrap(), "Hi Ada");

    std::fs::write(&path, "Bye {{name}}").unwrap();
    assert_eq!(renderer.render("greeting", &ctx).await.unwrap(), "Bye Ada");
  }

  #[tokio::test]
  async fn test_missing_template_reports_file() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = TemplateRenderer::new(dir.path());

    let err = renderer.render("missing", &Map::new()).await.unwrap_err();

    assert!(matches!(err, MailError::Template { ref template, .. } if template == "missing"));
    let cause = err.source().expect("cause").to_string();
    assert!(cause.contains("missing.hbs"), "unexpected cause: {}", cause);
  }

  #[tokio::test]
  async fn test_malformed_template_is_template_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.hbs"), "{{#if name}}unclosed").unwrap();

    let renderer = TemplateRenderer::new(dir.path());
    let err = renderer
      .render("broken", &context(json!({ "name": "Ada" })))
      .await
      .unwrap_err();

    match err {
      MailError::Template {
        source: TemplateError::Render { path, .. },
        ..
      } => assert!(path.ends_with("broken.hbs")),
      other => panic!("expected render error, got {:?}", other),
    }
  }

  #[test]
  fn test_template_path_rejects_traversal() {
    let renderer = TemplateRenderer::new("/srv/templates");

    assert_eq!(
      renderer.template_path("auth/welcome").unwrap(),
      PathBuf::from("/srv/templates/auth/welcome.hbs")
    );
    assert!(renderer.template_path("../secrets").is_err());
    assert!(renderer.template_path("/etc/passwd").is_err());
    assert!(renderer.template_path("").is_err());
  }
}
