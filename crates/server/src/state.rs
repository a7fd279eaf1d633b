use std::{sync::Arc, time::Instant};

use db::DBService;
use services::services::{chat_api::ChatApiClient, config::Config, monitor::LogRouter};

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    logs: Arc<LogRouter>,
    config: Arc<Config>,
    chat: Option<ChatApiClient>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        db: DBService,
        logs: LogRouter,
        config: Config,
        chat: Option<ChatApiClient>,
    ) -> Self {
        Self {
            db,
            logs: Arc::new(logs),
            config: Arc::new(config),
            chat,
            started_at: Instant::now(),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn logs(&self) -> &LogRouter {
        &self.logs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chat(&self) -> Option<&ChatApiClient> {
        self.chat.as_ref()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
