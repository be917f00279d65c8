use chrono::Duration;
use copydesk_engine::{db_types::Order, events::EventProducers, messaging::MessageFeed, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, orders that have sat in `pending_payment` longer than `pending_limit` are cancelled and
/// their annulment events fired.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    feed: MessageFeed,
    pending_limit: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = OrderFlowApi::new(db, producers, feed);
        info!("🕰️ Pending-payment expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running pending-payment expiry job");
            match api.expire_stale_orders(pending_limit).await {
                Ok(expired) if expired.is_empty() => {},
                Ok(expired) => {
                    info!("🕰️ {} orders expired: {}", expired.len(), order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running pending-payment expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] #{} {}", o.order_id, o.order_number, o.client_email))
        .collect::<Vec<String>>()
        .join(", ")
}
