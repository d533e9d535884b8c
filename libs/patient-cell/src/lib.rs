pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

use std::sync::Arc;

use shared_config::AppConfig;

use services::ledger::LedgerService;
use store::LedgerStore;

/// Long-lived state for the patient cell: the ledger store outlives any
/// single request.
pub struct PatientCellState {
    pub config: Arc<AppConfig>,
    pub ledger: LedgerService,
}

impl PatientCellState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let store = LedgerStore::new();
        Self {
            config,
            ledger: LedgerService::new(store),
        }
    }
}
