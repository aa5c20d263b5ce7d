use std::sync::Arc;

use crate::attendance::AttendanceService;
use crate::cache::CacheClient;
use crate::store::{AttendanceStore, ShiftProvider};

/// Shared application state handed to the router. Everything is an injected
/// handle; construction happens once in the bootstrap path.
#[derive(Clone)]
pub struct AppState {
    pub attendance: Arc<AttendanceService>,
    pub store: Arc<dyn AttendanceStore>,
    pub directory: Arc<dyn ShiftProvider>,
    pub cache: Arc<dyn CacheClient>,
}
