use std::sync::Arc;

use tokio::signal;
use tracing::info;

use refurb_hub_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::init_schema(&db_pool).await?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_sender, event_rx) = api::events::channel(cfg.event_channel_capacity);
    let feed = api::events::feed::ChangeFeed::new(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx, feed.clone()));

    let state = api::AppState::new(db_arc.clone(), cfg, event_sender);

    // Keep a live view of the request stream in the server log.
    let notifier = api::events::feed::ChangeNotifier::new(feed, db_arc);
    let _subscription = notifier.subscribe_requests(
        |alert| {
            info!(
                "New request from {} - {}x {}",
                alert.city.as_deref().unwrap_or("unknown location"),
                alert.quantity_requested,
                alert.instrument_type
            );
        },
        || {},
    );

    info!(
        "Refurb hub engine running ({} lifecycle); press Ctrl+C to stop",
        state.config.lifecycle_model
    );
    signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
