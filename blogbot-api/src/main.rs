use blogbot_common::{
    service::{
        auth::AuthService,
        posts::PostService,
        token::{Algorithm, SigningConfig, SigningConfigError, TokenSigner},
    },
    util::{NonPositiveDurationError, PositiveDuration},
};
use blogbot_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::ServerState;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
    #[error("Invalid token signing configuration: {0}")]
    Signing(#[from] SigningConfigError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    jwt_secret: String,
    #[serde(default = "default_jwt_algorithm")]
    jwt_algorithm: Algorithm,
    #[serde(default = "default_access_token_ttl_seconds")]
    access_token_ttl_seconds: i64,
    #[serde(default = "default_refresh_token_ttl_seconds")]
    refresh_token_ttl_seconds: i64,
}

fn default_jwt_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_access_token_ttl_seconds() -> i64 {
    60 * 60
}

fn default_refresh_token_ttl_seconds() -> i64 {
    7 * 24 * 60 * 60
}

impl Env {
    fn signing_config(&self) -> Result<SigningConfig, InitError> {
        Ok(SigningConfig {
            algorithm: self.jwt_algorithm,
            secret: self.jwt_secret.clone().into_bytes(),
            access_ttl: PositiveDuration::from_seconds(self.access_token_ttl_seconds)?,
            refresh_ttl: PositiveDuration::from_seconds(self.refresh_token_ttl_seconds)?,
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blogbot_api=debug,\
                blogbot_common=debug,\
                blogbot_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    shutdown.cancel();
                }
                Err(err) => error!(error = %err, "Could not listen for Ctrl-C"),
            }
        }
    });

    shutdown
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let signer = TokenSigner::new(env.signing_config()?)?;

    let db_client = Arc::new(DbClient::connect(&env.database_url).await?);
    db_client.migrate().await?;

    let state = ServerState {
        auth: Arc::new(AuthService::new(db_client.clone(), signer)),
        posts: Arc::new(PostService::new(db_client.clone(), db_client)),
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
