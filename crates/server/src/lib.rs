pub mod auth;
pub mod error;
pub mod routes;

use std::sync::Arc;

use db::DBService;
use services::services::{config::Config, notification::NotificationService};

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub notifications: NotificationService,
    pub config: Arc<Config>,
}
