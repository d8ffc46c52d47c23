use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::history::HistoryStore;
use crate::styles::StyleCatalog;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub history: Arc<Mutex<HistoryStore>>,
    pub styles: Arc<Mutex<StyleCatalog>>,
}

impl AppState {
    pub fn new(config: Config, history: HistoryStore, styles: StyleCatalog) -> Self {
        AppState {
            config: Arc::new(config),
            history: Arc::new(Mutex::new(history)),
            styles: Arc::new(Mutex::new(styles)),
        }
    }
}
