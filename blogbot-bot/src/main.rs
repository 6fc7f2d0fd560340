use blogbot_common::service::posts::PostService;
use blogbot_db::client::{DbClient, DbError};
use handlers::BotError;
use serde::Deserialize;
use std::sync::Arc;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod action;
mod handlers;
mod render;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
}

#[derive(Clone, Deserialize)]
struct Env {
    telegram_bot_token: String,
    database_url: String,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blogbot_bot=debug,\
                blogbot_common=debug,\
                blogbot_db=debug,\
                teloxide=info,sqlx=warn"
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

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_client = Arc::new(DbClient::connect(&env.database_url).await?);
    db_client.migrate().await?;
    let posts = Arc::new(PostService::new(db_client.clone(), db_client));

    let bot = Bot::new(env.telegram_bot_token);

    info!("Starting to poll for updates");
    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![posts])
        .error_handler(Arc::new(|err: BotError| async move {
            error!(error = %err, "Handling an update failed");
        }))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
