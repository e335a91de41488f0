use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use paste_api::service::PasteService;

/// Background task that deletes pastes which can no longer be shown.
///
/// Purely housekeeping: inert rows are already invisible to readers.
pub async fn run_cleanup_loop(pastes: PasteService, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match pastes.purge_inert(Utc::now()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: purged {} inert pastes", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
