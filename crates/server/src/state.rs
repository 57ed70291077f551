use std::sync::Arc;

use library::{Library, ScanSummary, Scanner};
use parking_lot::RwLock;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub library: Library,
    pub scanner: Scanner,
    pub config: Arc<ServerConfig>,
    pub last_scan: Arc<RwLock<LastScan>>,
}

/// Outcome of the most recent background scan.
#[derive(Clone, Debug, Default)]
pub enum LastScan {
    #[default]
    Never,
    Finished(ScanSummary),
    Failed(String),
}

impl AppState {
    pub fn new(
        library: Library,
        scanner: Scanner,
        config: ServerConfig,
    ) -> Self {
        Self {
            library,
            scanner,
            config: Arc::new(config),
            last_scan: Arc::new(RwLock::new(LastScan::Never)),
        }
    }
}
