use std::sync::Arc;

use crate::config::Config;
use crate::storage::SampleStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SampleStore>,
}
