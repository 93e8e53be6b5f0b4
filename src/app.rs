use axum::{response::Html, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{domains::mail::rest::mail_routes, state::SharedAppState};

pub fn create_app(state: SharedAppState) -> Router {
  Router::new()
    .route("/", get(hello_world_handler))
    .nest("/api/v1", mail_routes())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub async fn hello_world_handler() -> Html<String> {
  Html("<h1>Hello, World!</h1>".to_string())
}
