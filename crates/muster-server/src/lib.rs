//! Muster server library: configuration, seeding options and the top-level
//! router. The binary in `main.rs` is a thin CLI over these pieces.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use muster_core::{
  seed::{AdminSeed, SeedOptions},
  serviceperson::NewServiceperson,
  store::RecordStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MUSTER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_database_path")]
  pub database_path:       PathBuf,
  #[serde(default = "default_admin_username")]
  pub admin_username:      String,
  #[serde(default = "default_admin_name")]
  pub admin_name:          String,
  /// PHC string produced by `muster-server hash-password`. Without it no
  /// admin user is seeded.
  #[serde(default)]
  pub admin_password_hash: Option<String>,
  /// JSON array of servicepeople imported by the seeder.
  #[serde(default)]
  pub servicepeople_seed:  Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_database_path() -> PathBuf { PathBuf::from("muster.sqlite3") }

fn default_admin_username() -> String { "admin".to_owned() }

fn default_admin_name() -> String { "Administrator".to_owned() }

impl ServerConfig {
  /// Load `path` (optional) layered under `MUSTER_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MUSTER"))
      .build()
      .context("failed to read config file")?;

    settings.try_deserialize().context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn admin_seed(&self) -> Option<AdminSeed> {
    self.admin_password_hash.as_ref().map(|hash| AdminSeed {
      username:      self.admin_username.clone(),
      name:          self.admin_name.clone(),
      password_hash: hash.clone(),
    })
  }

  /// The servicepeople file to import: `override_path` or the configured
  /// `servicepeople_seed`, with `~` expanded.
  pub fn servicepeople_path(&self, override_path: Option<&Path>) -> Option<PathBuf> {
    override_path.or(self.servicepeople_seed.as_deref()).map(expand_tilde)
  }

  /// Build the seeder options, reading the servicepeople file from
  /// [`Self::servicepeople_path`].
  pub fn seed_options(&self, override_path: Option<&Path>) -> anyhow::Result<SeedOptions> {
    let servicepeople = match self.servicepeople_path(override_path) {
      Some(path) => load_servicepeople(&path)?,
      None => Vec::new(),
    };
    if self.admin_password_hash.is_none() {
      tracing::warn!("admin_password_hash is not set; no admin user will be seeded");
    }
    Ok(SeedOptions { admin: self.admin_seed(), servicepeople })
  }
}

/// Read a JSON array of servicepeople.
pub fn load_servicepeople(path: &Path) -> anyhow::Result<Vec<NewServiceperson>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read servicepeople file {path:?}"))?;
  serde_json::from_str(&text).with_context(|| format!("failed to parse servicepeople file {path:?}"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api` with request tracing.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: RecordStore + 'static,
{
  Router::new()
    .nest("/api", muster_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use muster_core::seed;
  use muster_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt as _;

  fn config(hash: Option<String>) -> ServerConfig {
    ServerConfig {
      host:                default_host(),
      port:                default_port(),
      database_path:       PathBuf::from(":memory:"),
      admin_username:      "admin".to_owned(),
      admin_name:          "Administrator".to_owned(),
      admin_password_hash: hash,
      servicepeople_seed:  None,
    }
  }

  fn quick_hash(password: &str) -> String {
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  #[test]
  fn missing_config_file_falls_back_to_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/muster.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.admin_username, "admin");
  }

  #[test]
  fn servicepeople_file_is_parsed() {
    let path = std::env::temp_dir().join(format!("muster-seed-{}.json", std::process::id()));
    std::fs::write(
      &path,
      r#"[{"number": 4001, "first_name": "Ann", "last_name": "Baptiste", "rank_id": 10}]"#,
    )
    .unwrap();

    let options = config(None).seed_options(Some(&path)).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(options.admin.is_none());
    assert_eq!(options.servicepeople.len(), 1);
    assert_eq!(options.servicepeople[0].battalion_id, None);
  }

  #[test]
  fn tilde_expands_to_home() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/db.sqlite3")), PathBuf::from(home).join("db.sqlite3"));
    }
    assert_eq!(expand_tilde(Path::new("/var/db")), PathBuf::from("/var/db"));
  }

  #[test]
  fn servicepeople_seed_path_expands_tilde() {
    let mut cfg = config(None);
    assert_eq!(cfg.servicepeople_path(None), None);

    cfg.servicepeople_seed = Some(PathBuf::from("~/officers.json"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(cfg.servicepeople_path(None), Some(PathBuf::from(home).join("officers.json")));
    }
    let explicit = Path::new("/srv/muster/officers.json");
    assert_eq!(cfg.servicepeople_path(Some(explicit)), Some(explicit.to_path_buf()));
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cfg = config(Some(quick_hash("secret")));
    seed::run(&store, &cfg.seed_options(None).unwrap()).await.unwrap();
    let app = app(Arc::new(store));

    let auth = format!("Basic {}", B64.encode("admin:secret"));
    let req = Request::builder()
      .uri("/api/ranks")
      .header(header::AUTHORIZATION, auth)
      .body(Body::empty())
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().uri("/ranks").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
