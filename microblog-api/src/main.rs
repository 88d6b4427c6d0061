use microblog_api::{
    config::{Config, ConfigError, StorageBackend},
    credentials::{CredentialError, CredentialService},
    server::{self, ServerState},
};
use microblog_common::model::auth::{PasswordHasher, TokenSigner};
use microblog_db::{
    client::DbClient,
    memory::MemoryStorage,
    postgres::PgStorage,
    storage::{DbError, Storage},
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("DATABASE_URL must be set for the postgres storage backend")]
    MissingDatabaseUrl,
    #[error("Error setting up credentials: {0}")]
    Credentials(#[from] CredentialError),
    #[error("Error opening storage: {0}")]
    Storage(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "microblog_api=debug,\
                microblog_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>, InitError> {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, nothing survives a restart");
            Ok(Arc::new(MemoryStorage::new(
                config.worker_id,
                config.process_id,
            )))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(InitError::MissingDatabaseUrl)?;
            let storage = PgStorage::connect(
                url,
                config.database_max_connections,
                config.worker_id,
                config.process_id,
            )
            .await?;
            Ok(Arc::new(storage))
        }
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Could not listen for ctrl-c, graceful shutdown is disabled");
            return;
        }
        info!("Shutting down");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let config = Config::load()?;

    let storage = open_storage(&config).await?;
    let db_client = DbClient::new(storage, config.storage_timeout());
    let credentials = CredentialService::new(
        db_client.clone(),
        PasswordHasher::default(),
        TokenSigner::new(config.token_secret.as_bytes()),
    )?;

    let app = server::app(ServerState {
        db_client,
        credentials,
    });

    let server_address = SocketAddr::new(config.server_address, config.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, backend = ?config.storage_backend, "Listening");

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
