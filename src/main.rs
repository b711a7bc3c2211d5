use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidstream_server::{
    run_server, RequestsLoggingLevel, SqlitePlaylistStore, SqliteUserStore, TokenIssuer,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file to use for user storage.
    #[clap(value_parser = parse_path)]
    pub user_db: PathBuf,

    /// Path to the SQLite database file to use for playlist storage.
    #[clap(value_parser = parse_path)]
    pub playlist_db: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Disable the `Secure` attribute on auth cookies, for plain-http local
    /// development only.
    #[clap(long, default_value_t = false)]
    pub insecure_cookies: bool,

    /// Base URL used to construct share URLs (defaults to
    /// http://localhost:<port>).
    #[clap(long)]
    pub public_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let access_secret = match std::env::var("ACCESS_TOKEN_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => bail!("ACCESS_TOKEN_SECRET must be set"),
    };
    let refresh_secret = match std::env::var("REFRESH_TOKEN_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => bail!("REFRESH_TOKEN_SECRET must be set"),
    };
    if access_secret == refresh_secret {
        bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
    }

    info!("Opening SQLite user database at {:?}...", cli_args.user_db);
    let user_store = Arc::new(SqliteUserStore::new(&cli_args.user_db)?);

    info!(
        "Opening SQLite playlist database at {:?}...",
        cli_args.playlist_db
    );
    let playlist_store = Arc::new(SqlitePlaylistStore::new(&cli_args.playlist_db)?);

    let token_issuer = TokenIssuer::new(&access_secret, &refresh_secret);

    info!("Ready to serve at port {}!", cli_args.port);
    run_server(
        user_store,
        playlist_store,
        token_issuer,
        cli_args.logging_level,
        cli_args.port,
        !cli_args.insecure_cookies,
        cli_args.public_base_url,
    )
    .await
}
