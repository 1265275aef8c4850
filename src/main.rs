mod alert;
mod config;
mod database;
mod error;
mod models;
mod processor;
mod sensor;
mod utils;
mod webhook;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use alert::LogAlertSender;
use config::ServiceConfig;
use database::{MemoryStateStore, PostgresStateStore, StateStore};
use processor::{EventOutcome, EventProcessor};
use utils::format_datetime;
use webhook::parse_webhook_body;

/// Read webhook bodies line by line from standard input and process their events
async fn main_loop<S: StateStore>(
    processor: EventProcessor<S, LogAlertSender>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Waiting for webhook bodies since {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    let mut lines = BufReader::new(stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let events = match parse_webhook_body(line) {
            Ok(events) => events,
            Err(e) => {
                error!("Dropping webhook body: {}", e);
                continue;
            }
        };
        debug!("Webhook body carried {} device events", events.len());

        let results = processor.process_batch(&events).await;
        for (event, result) in events.iter().zip(results) {
            match result {
                Ok(EventOutcome::Processed { decision, delivery }) => {
                    info!(
                        "Processed event for {}: {:?}, delivery {:?}",
                        event.user_id, decision, delivery
                    );
                }
                Ok(EventOutcome::Ignored(reason)) => {
                    debug!("Ignored event for {}: {:?}", event.user_id, reason);
                }
                Err(e) => {
                    error!("Failed to process event for {}: {}", event.user_id, e);
                }
            }
        }
    }

    info!("Input closed");
    Ok(())
}

async fn run(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sender = LogAlertSender::new(config.channel_access_token.clone());

    match &config.database_url {
        Some(database_url) => {
            let store = PostgresStateStore::connect(database_url).await?;
            let processor =
                EventProcessor::new(store, sender, config.store_timeout, config.alert_timeout);
            main_loop(processor).await
        }
        None => {
            warn!("DATABASE_URL not set, user state is kept in memory only");
            let processor = EventProcessor::new(
                MemoryStateStore::new(),
                sender,
                config.store_timeout,
                config.alert_timeout,
            );
            main_loop(processor).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServiceConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Starting bike alert service");

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    tokio::select! {
        result = run(config) => {
            match result {
                Ok(_) => info!("Service stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        Ok(()) = &mut rx => {
            info!("Service terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
