//! HTTP Basic authentication and caller resolution.
//!
//! Credentials map to an account; the account's profile decides whether the
//! request runs as an admin or a student.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use lectern_core::{
  access::Caller,
  store::{AnalyticsStore, ProgressCalculator},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::Error};

/// One login accepted by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// Profile the account acts as.
  pub profile_id:    Uuid,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub accounts: Vec<Account>,
}

/// Verify Basic credentials and return the matching account's profile id.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Uuid, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = config
    .accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(account.profile_id)
}

/// Look up the role for an authenticated profile.
///
/// An account whose profile has been deleted can no longer log in.
pub async fn resolve_caller<S>(store: &S, profile_id: Uuid) -> Result<Caller, Error>
where
  S: AnalyticsStore,
{
  let profile = store
    .get_profile(profile_id)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?
    .ok_or(Error::Unauthorized)?;
  Ok(Caller { id: profile.id, role: profile.role })
}

/// Middleware: authenticate the request and attach its [`Caller`] as an
/// extension for the API handlers.
pub async fn require_caller<S, P>(
  State(state): State<AppState<S, P>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error>
where
  S: AnalyticsStore + 'static,
  P: ProgressCalculator + 'static,
{
  let profile_id = verify_auth(req.headers(), &state.auth)?;
  let caller = resolve_caller(state.engine.store(), profile_id).await?;
  tracing::debug!(caller = %caller.id, role = %caller.role, "authenticated");
  req.extensions_mut().insert(caller);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, header};
  use chrono::Utc;
  use lectern_core::profile::{Profile, Role};
  use lectern_store_sqlite::SqliteStore;
  use rand_core::OsRng;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn config(profile_id: Uuid) -> AuthConfig {
    AuthConfig {
      accounts: vec![
        Account { username: "ada".into(), password_hash: hash("secret"), profile_id },
        Account { username: "bob".into(), password_hash: hash("hunter2"), profile_id: Uuid::new_v4() },
      ],
    }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let encoded = B64.encode(format!("{user}:{pass}"));
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
  }

  #[test]
  fn correct_credentials_yield_profile() {
    let id = Uuid::new_v4();
    assert_eq!(verify_auth(&basic("ada", "secret"), &config(id)).unwrap(), id);
  }

  #[test]
  fn password_is_checked_per_account() {
    let cfg = config(Uuid::new_v4());
    assert!(matches!(verify_auth(&basic("ada", "hunter2"), &cfg), Err(Error::Unauthorized)));
    assert!(verify_auth(&basic("bob", "hunter2"), &cfg).is_ok());
  }

  #[test]
  fn unknown_user() {
    let cfg = config(Uuid::new_v4());
    assert!(matches!(verify_auth(&basic("eve", "secret"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let cfg = config(Uuid::new_v4());
    assert!(matches!(verify_auth(&HeaderMap::new(), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config(Uuid::new_v4());
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(verify_auth(&headers, &cfg), Err(Error::Unauthorized)));
  }

  #[tokio::test]
  async fn caller_takes_role_from_profile() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let profile = Profile {
      id:         Uuid::new_v4(),
      full_name:  None,
      email:      "root@example.com".into(),
      role:       Role::Admin,
      created_at: Utc::now(),
    };
    store.insert_profile(&profile).await.unwrap();

    let caller = resolve_caller(&store, profile.id).await.unwrap();
    assert!(caller.is_admin());

    let missing = resolve_caller(&store, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(Error::Unauthorized)));
  }
}
