use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::Bot;
use crate::telegram::TelegramClient;

/// Pause after a failed `getUpdates` before polling again.
const FAILED_POLL_PAUSE: Duration = Duration::from_secs(5);

/// Long-poll Telegram and dispatch every update until `shutdown` resolves.
///
/// A failing update is logged and skipped; the offset still moves past it.
pub async fn run_polling(bot: &Bot<TelegramClient>, shutdown: impl Future<Output = ()>) {
    poll(bot, FAILED_POLL_PAUSE, shutdown).await;
}

async fn poll(bot: &Bot<TelegramClient>, failed_pause: Duration, shutdown: impl Future<Output = ()>) {
    tokio::pin!(shutdown);
    let mut offset = 0;
    info!("polling Telegram for updates");

    loop {
        let result = tokio::select! {
            _ = &mut shutdown => break,
            result = bot.api().get_updates(offset) => result,
        };

        match result {
            Ok(batch) => {
                if let Some(next) = batch.next_offset {
                    offset = offset.max(next);
                }
                for update in batch.updates {
                    debug!(update_id = update.update_id, "dispatching update");
                    if let Err(e) = bot.handle_update(&update).await {
                        error!(update_id = update.update_id, error = %e, "failed to handle update");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(failed_pause) => {}
                }
            }
        }
    }

    info!("polling stopped");
}
