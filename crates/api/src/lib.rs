use std::sync::Arc;

use axum::{
  extract::{FromRequest, State},
  http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
  },
  middleware::from_fn,
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use error::ApiError;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use config::{Config, Environment};
use handlers::{
  auth::{init_auth_routes, Keys},
  projects::init_projects_routes,
  users::init_users_routes,
};
use store::Store;

pub mod config;
pub mod entities;
pub mod error;
mod handlers;
pub mod service;
pub mod store;

/// Shared by every handler: the persistence handle and the token settings.
#[derive(Clone)]
pub struct AppState {
  pub(crate) store: Arc<dyn Store>,
  pub(crate) keys: Arc<Keys>,
  /// Token lifetime in minutes.
  pub(crate) token_maxage: i64,
}

impl AppState {
  pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
    Self {
      store,
      keys: Arc::new(Keys::new(config.jwt_secret.as_bytes())),
      token_maxage: config.jwt_maxage,
    }
  }
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct AppJson<T>(T);

/// Handle health check requests
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
  match state.store.ping().await {
    Ok(()) => (
      StatusCode::OK,
      Json(json!({
        "code": "200",
        "success": true,
      })),
    ),
    Err(err) => {
      error!("Health check failed: {:?}", err);
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
          "code": "500",
          "success": false,
        })),
      )
    },
  }
}

/// Builds the full router: api routes, health check, swagger ui and the
/// cross-cutting layers.
pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
  // Initialize cors settings
  let cors = CorsLayer::new()
    .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
    .allow_credentials(true)
    .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

  #[derive(OpenApi)]
  #[openapi(
    tags(
      (name = "auth", description = "Registration and sessions"),
      (name = "users", description = "Profiles, freelancer directory and dashboards"),
      (name = "projects", description = "Projects, proposals, milestones and reviews")
    )
  )]
  struct ApiDoc;

  let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
    .route("/health", get(health_handler))
    .nest("/api/auth", init_auth_routes())
    .nest("/api/users", init_users_routes(state.clone()))
    .nest("/api/projects", init_projects_routes(state.clone()))
    .layer(cors)
    .with_state(state)
    .split_for_parts();

  let router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api));

  let router = match config.environment {
    Environment::Development => router.layer(from_fn(error::expose_error_reports)),
    Environment::Production => router,
  };

  Ok(router)
}

pub async fn run(config: Config, store: Arc<dyn Store>, cancel_token: CancellationToken) -> anyhow::Result<()> {
  let state = AppState::new(store, &config);
  let router = app(state, &config)?;

  info!("Starting api server on {} ({})...", config.server_url(), config.environment);

  let listener = TcpListener::bind(config.server_url()).await?;
  axum::serve(listener, router.into_make_service())
    .with_graceful_shutdown(Box::pin(async move { cancel_token.cancelled().await }))
    .await?;

  info!("Stopped api server");

  Ok(())
}
