use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventzon_server::config::Config;
use eventzon_server::notifications::{
    ConsoleMailer, Mailer, NotificationDispatcher, NotificationQueue, SmtpMailer,
};
use eventzon_server::routes::{create_routes, RouterOptions};
use eventzon_server::services::TicketGenerator;
use eventzon_server::state::AppState;
use eventzon_server::store::{PostgresStore, Store};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Sending email over SMTP");
            Arc::new(SmtpMailer::new(smtp).expect("Invalid SMTP configuration"))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will only be logged");
            Arc::new(ConsoleMailer)
        }
    };

    let generator = TicketGenerator::new(config.tickets.clone());
    let dispatcher = NotificationDispatcher::new(mailer, generator.clone(), config.mail_locale);
    let (queue, _worker) = NotificationQueue::spawn(dispatcher, config.notification_retry.clone());

    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));
    let state = AppState::new(store, config.booking, generator, Some(Arc::new(queue)));

    let app: Router = create_routes(
        state,
        &RouterOptions {
            production: config.production,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        },
    );

    tracing::info!("Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
