pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

use std::sync::Arc;

use shared_config::AppConfig;

use services::booking::BookingService;
use services::slots::SlotService;
use store::ConsultationStore;

/// Long-lived state for the consultation cell. The store holds slots and
/// bookings and is shared by both services.
pub struct ConsultationCellState {
    pub config: Arc<AppConfig>,
    pub slots: SlotService,
    pub booking: BookingService,
}

impl ConsultationCellState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let store = ConsultationStore::new();
        Self {
            slots: SlotService::new(&config, store.clone()),
            booking: BookingService::new(&config, store),
            config,
        }
    }
}
