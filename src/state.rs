use crate::{config::AppConfig, db::OrmConn};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: AppConfig,
    /// Shared client for outbound calls (Google token verification).
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        Self {
            orm,
            config,
            http: reqwest::Client::new(),
        }
    }
}
