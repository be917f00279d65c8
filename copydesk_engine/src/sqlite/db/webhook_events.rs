use cpd_common::UsdCents;
use sqlx::SqliteConnection;

use crate::db_types::OrderId;

/// Records a provider webhook delivery. Returns `false` when the event id has been seen before, which is
/// the idempotency signal for the payment flow.
pub async fn record_event_if_new(
    event_id: &str,
    kind: &str,
    order_id: &OrderId,
    amount: UsdCents,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO webhook_events (event_id, kind, order_id, amount) VALUES ($1, $2, $3, $4)",
    )
    .bind(event_id)
    .bind(kind)
    .bind(order_id.as_str())
    .bind(amount.value())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
