use std::env;

use tokio::signal;

use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use arpix_email_sender::app::create_app;
use arpix_email_sender::state::SharedAppState;
use arpix_email_sender::utils::init_mail_sender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mail_sender = init_mail_sender().await;
  let app = create_app(SharedAppState::new(mail_sender));

  let addr = env::var("EMAIL_SENDER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
  let listener = tokio::net::TcpListener::bind(&addr).await?;

  tracing::info!("Server running on http://{}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!("Failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(e) => {
        tracing::error!("Failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }

  tracing::info!("Received termination signal, shutting down gracefully...");
}
