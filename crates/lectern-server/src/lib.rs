//! HTTP host for the Lectern reporting API.
//!
//! Wraps [`lectern_api::api_router`] with Basic authentication, a health
//! check and the download endpoint that serves signed export links.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  ffi::OsString,
  path::{Path as FsPath, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::{
  Json, Router,
  extract::{Path, Query, State, rejection::QueryRejection},
  http::header,
  middleware,
  response::{IntoResponse, Response},
  routing::get,
};
use chrono::Utc;
use lectern_core::store::{AnalyticsStore, ProgressCalculator};
use lectern_export::FsBlobStore;
use lectern_reports::{EngineConfig, ReportEngine};
use serde::Deserialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use auth::{Account, AuthConfig, require_caller};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  /// Directory export files are written under.
  pub export_dir:           PathBuf,
  /// Externally reachable origin, used to build download links.
  pub public_base_url:      String,
  pub signing_secret:       String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  #[serde(default)]
  pub accounts:             Vec<Account>,
  #[serde(default)]
  pub engine:               EngineConfig,
}

fn default_request_timeout() -> u64 { 30 }

impl ServerConfig {
  /// Read `path` (optional) and overlay `LECTERN__*` environment variables.
  pub fn load(path: &FsPath) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("LECTERN").separator("__"))
      .build()?
      .try_deserialize()
  }

  /// Resolve `~/` prefixes in the on-disk paths against `home`.
  pub fn with_home(mut self, home: Option<OsString>) -> Self {
    if let Some(home) = home.map(PathBuf::from) {
      for path in [&mut self.store_path, &mut self.export_dir] {
        if let Ok(rest) = path.strip_prefix("~") {
          *path = home.join(rest);
        }
      }
    }
    self
  }

  /// Base URL that signed export links point at.
  pub fn files_url(&self) -> String {
    format!("{}/files", self.public_base_url.trim_end_matches('/'))
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub engine: Arc<ReportEngine<S, P, FsBlobStore>>,
  pub auth:   Arc<AuthConfig>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self { engine: Arc::clone(&self.engine), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the server.
///
/// `/health` and `/files/*` are public; everything under `/api` requires
/// Basic credentials.
pub fn router<S, P>(state: AppState<S, P>, request_timeout: Duration) -> Router
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
{
  let api = lectern_api::api_router(state.engine.clone())
    .layer(middleware::from_fn_with_state(state.clone(), require_caller::<S, P>));

  Router::new()
    .route("/health", get(health))
    .route("/files/{*path}", get(download::<S, P>))
    .with_state(state)
    .nest("/api", api)
    .layer(TimeoutLayer::new(request_timeout))
    .layer(TraceLayer::new_for_http())
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
  Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct SignedLink {
  expires:   i64,
  signature: String,
}

/// `GET /files/{*path}?expires=..&signature=..`
async fn download<S, P>(
  State(state): State<AppState<S, P>>,
  Path(path): Path<String>,
  link: Result<Query<SignedLink>, QueryRejection>,
) -> Result<Response, Error>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
{
  let Ok(Query(link)) = link else {
    return Err(Error::Forbidden);
  };
  let blobs = state.engine.blobs();
  if !blobs.verify(&path, link.expires, &link.signature, Utc::now()) {
    tracing::debug!(path, "rejected download link");
    return Err(Error::Forbidden);
  }

  let local = blobs.local_path(&path).map_err(|_| Error::NotFound)?;
  let bytes = match tokio::fs::read(&local).await {
    Ok(b) => b,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound),
    Err(e) => return Err(e.into()),
  };

  let content_type = match local.extension().and_then(|e| e.to_str()) {
    Some("csv") => "text/csv; charset=utf-8",
    Some("json") => "application/json",
    _ => "application/octet-stream",
  };
  Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use lectern_core::profile::{Profile, Role};
  use lectern_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  fn scratch_dir() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
      "lectern-server-test-{}-{}",
      std::process::id(),
      NEXT.fetch_add(1, Ordering::Relaxed)
    ))
  }

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  async fn make_state() -> AppState<SqliteStore, SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut accounts = Vec::new();
    for (name, role) in [("admin", Role::Admin), ("ada", Role::Student)] {
      let profile = Profile {
        id:         Uuid::new_v4(),
        full_name:  None,
        email:      format!("{name}@example.com"),
        role,
        created_at: Utc::now(),
      };
      store.insert_profile(&profile).await.unwrap();
      accounts.push(Account {
        username:      name.to_owned(),
        password_hash: hash("secret"),
        profile_id:    profile.id,
      });
    }

    let store = Arc::new(store);
    let blobs = FsBlobStore::new(scratch_dir(), "http://localhost:8080/files", "test-secret");
    AppState {
      engine: Arc::new(ReportEngine::new(store.clone(), store, blobs, EngineConfig::default())),
      auth:   Arc::new(AuthConfig { accounts }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:  AppState<SqliteStore, SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   &str,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    if !body.is_empty() {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state, Duration::from_secs(5)).oneshot(req).await.unwrap()
  }

  async fn json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[test]
  fn config_defaults_fill_optional_fields() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "host": "127.0.0.1",
      "port": 8080,
      "store_path": "lectern.db",
      "export_dir": "exports",
      "public_base_url": "https://lms.example.com/",
      "signing_secret": "s",
    }))
    .unwrap();
    assert_eq!(cfg.request_timeout_secs, 30);
    assert!(cfg.accounts.is_empty());
    assert_eq!(cfg.engine, EngineConfig::default());
    assert_eq!(cfg.files_url(), "https://lms.example.com/files");
  }

  #[test]
  fn home_prefix_is_expanded() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "host": "0.0.0.0",
      "port": 80,
      "store_path": "~/lectern/lectern.db",
      "export_dir": "/var/lib/lectern/exports",
      "public_base_url": "http://localhost",
      "signing_secret": "s",
    }))
    .unwrap();

    let cfg = cfg.with_home(Some("/home/ada".into()));
    assert_eq!(cfg.store_path, PathBuf::from("/home/ada/lectern/lectern.db"));
    assert_eq!(cfg.export_dir, PathBuf::from("/var/lib/lectern/exports"));

    let unresolved = cfg.clone().with_home(None);
    assert_eq!(unresolved.store_path, cfg.store_path);
  }

  #[tokio::test]
  async fn health_needs_no_credentials() {
    let state = make_state().await;
    let resp = oneshot_raw(state, "GET", "/health", None, "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_without_credentials_is_401() {
    let state = make_state().await;
    let resp = oneshot_raw(state, "GET", "/api/reports/admin/dashboard", None, "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(json(resp).await["success"], false);
  }

  #[tokio::test]
  async fn admin_credentials_reach_admin_reports() {
    let state = make_state().await;
    let auth = auth_header("admin", "secret");
    let resp = oneshot_raw(state, "GET", "/api/reports/admin/dashboard", Some(&auth), "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["success"], true);
  }

  #[tokio::test]
  async fn student_role_comes_from_profile() {
    let state = make_state().await;
    let auth = auth_header("ada", "secret");
    let resp = oneshot_raw(state, "GET", "/api/reports/admin/dashboard", Some(&auth), "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn exported_file_downloads_through_signed_link() {
    let state = make_state().await;
    let auth = auth_header("admin", "secret");
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/api/exports",
      Some(&auth),
      r#"{"entity":"enrollments","format":"json"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json(resp).await;
    let url = body["data"]["file_url"].as_str().unwrap().to_owned();
    let uri = url.strip_prefix("http://localhost:8080").unwrap();

    let resp = oneshot_raw(state.clone(), "GET", uri, None, "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"[]");

    let tampered = uri.replace("signature=", "signature=0");
    let resp = oneshot_raw(state, "GET", &tampered, None, "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn download_without_signature_is_403() {
    let state = make_state().await;
    let resp = oneshot_raw(state, "GET", "/files/exports/2024/06/a.csv", None, "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }
}
