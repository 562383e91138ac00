//! muster-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the JSON API, runs the seeder, or hashes a
//! password for the config file.
//!
//! ```
//! cargo run -p muster-server -- hash-password
//! cargo run -p muster-server -- seed --servicepeople officers.json
//! cargo run -p muster-server -- serve --seed
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use muster_core::seed;
use muster_server::{ServerConfig, expand_tilde};
use muster_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Muster personnel records server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve {
    /// Run the idempotent seeder before listening.
    #[arg(long)]
    seed: bool,
  },
  /// Populate lookup tables, import servicepeople and create the admin user.
  Seed {
    /// JSON array of servicepeople; overrides `servicepeople_seed`.
    #[arg(long)]
    servicepeople: Option<PathBuf>,
  },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    let password = read_password()?;
    let hash = muster_api::auth::hash_password(&password).context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config)?;

  let database_path = expand_tilde(&server_cfg.database_path);
  let store = SqliteStore::open(&database_path)
    .await
    .with_context(|| format!("failed to open store at {database_path:?}"))?;

  match cli.command {
    Command::Seed { servicepeople } => {
      let options = server_cfg.seed_options(servicepeople.as_deref())?;
      let report = seed::run(&store, &options).await.context("seeding failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Serve { seed: run_seed } => {
      if run_seed {
        let options = server_cfg.seed_options(None)?;
        seed::run(&store, &options).await.context("seeding failed")?;
      }

      let app = muster_server::app(Arc::new(store));
      let address = server_cfg.address();

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }
    Command::HashPassword => {}
  }

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
