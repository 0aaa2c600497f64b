use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use server::{AppState, routes};
use services::services::{
    config::Config,
    deadline_watch::DeadlineWatchService,
    notification::{HttpMailer, MailChannel, NoopMailer, NotificationService},
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env());

    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open database")?;

    let mailer: Arc<dyn MailChannel> = match &config.mail_gateway_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone())),
        None => Arc::new(NoopMailer),
    };
    let notifications = NotificationService::new(db.clone(), mailer);

    DeadlineWatchService::spawn(
        db.clone(),
        notifications.clone(),
        config.overdue_sweep_interval,
        config.upcoming_sweep_interval,
    )
    .await;

    let state = AppState {
        db,
        notifications,
        config: config.clone(),
    };
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
