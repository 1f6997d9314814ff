use std::sync::Arc;

use sqlx::Pool;

use crate::suggest::Suggester;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool<sqlx::Sqlite>, suggester: Option<Suggester>) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                pool,
                suggester,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool<sqlx::Sqlite> {
        &self.state.pool
    }

    /// `None` when no API key is configured.
    pub fn suggester(&self) -> Option<&Suggester> {
        self.state.suggester.as_ref()
    }
}

struct AppStateInner {
    pool: Pool<sqlx::Sqlite>,
    app_config: AppConfig,
    suggester: Option<Suggester>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
        }
    }
}
