use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketlelo_server::config::Config;
use ticketlelo_server::routes::create_routes;
use ticketlelo_server::services::{LogTicketMailer, SmtpTicketMailer, TicketMailer};
use ticketlelo_server::state::AppState;
use ticketlelo_server::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ticketlelo_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let mailer: Arc<dyn TicketMailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Delivering tickets over SMTP");
            Arc::new(SmtpTicketMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, ticket emails will only be logged");
            Arc::new(LogTicketMailer)
        }
    };

    let state = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.store_timeout)
                .connect(database_url)
                .await?;
            tracing::info!("Successfully connected to database");

            sqlx::migrate!().run(&pool).await?;
            tracing::info!("Migrations run successfully");

            AppState::new(Arc::new(PgStore::new(pool)), mailer, &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            AppState::new(Arc::new(MemoryStore::new()), mailer, &config)
        }
    };

    let app = create_routes(state, &config);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
