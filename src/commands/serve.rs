use std::sync::{Arc, Mutex};

use marafon::bot::polling::run_polling;
use marafon::bot::{Bot, BotSettings};
use marafon::config::Config;
use marafon::error::Result;
use marafon::telegram::TelegramClient;
use marafon::web::{self, AppState};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{describe_location, open_database};

/// Run the webhook listener and, when a bot token is configured, the
/// Telegram poller until a shutdown signal arrives.
pub async fn run(config: &Config) -> Result<()> {
    let admin_ids = config.admin_ids()?;
    let location = config.database_location()?;
    let db = open_database(&location)?;
    info!(database = %describe_location(&location), "database ready");
    let db = Arc::new(Mutex::new(db));

    let listener = web::bind(&config.bind_address()).await?;
    let (stop_tx, stop_rx) = watch::channel(false);

    let state = AppState {
        db: Arc::clone(&db),
        webhook_token: config.webhook_token().map(Arc::from),
    };
    if state.webhook_token.is_none() {
        warn!("WEBHOOK_TOKEN is not set, webhooks are accepted without authentication");
    }
    let mut server = tokio::spawn(web::serve(listener, state, stopped(stop_rx.clone())));

    let poller = match config.bot_token() {
        Some(token) => {
            let client = TelegramClient::new(&config.telegram_api_url, token)?;
            let settings = BotSettings {
                admin_ids,
                support_contact: config.support_contact().map(str::to_string),
            };
            let bot = Bot::new(client, Arc::clone(&db), settings);
            let stop = stopped(stop_rx.clone());
            Some(tokio::spawn(async move { run_polling(&bot, stop).await }))
        }
        None => {
            warn!("BOT_TOKEN is not set, only the webhook listener is running");
            None
        }
    };

    let finished = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut server => Some(result),
    };
    info!("shutting down");
    // Receivers may already be gone if both tasks ended on their own.
    let _ = stop_tx.send(true);

    if let Some(poller) = poller {
        poller.await?;
    }
    match finished {
        Some(result) => result?,
        None => server.await?,
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
