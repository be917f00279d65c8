use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{OrderId, OrderStatusType, StageRecord};

/// Opens a new stage record for the order. The caller must have closed the previous open record first;
/// the append-only history relies on there being at most one open record per order.
pub async fn open_stage(
    order_id: &OrderId,
    stage: OrderStatusType,
    notes: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<StageRecord, sqlx::Error> {
    let record = sqlx::query_as(
        "INSERT INTO stage_records (order_id, stage, notes) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(stage)
    .bind(notes)
    .fetch_one(conn)
    .await?;
    trace!("📝️ Stage {stage} opened for order {order_id}");
    Ok(record)
}

/// Closes the order's open stage record, if any. Returns the number of records closed (0 or 1).
pub async fn close_open_stage(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE stage_records SET completed_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND completed_at IS NULL",
    )
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// The full stage history, oldest first.
pub async fn stage_history(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<StageRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM stage_records WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(records)
}

/// The single open stage record for the order, if one exists.
pub async fn open_stage_record(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<StageRecord>, sqlx::Error> {
    let record =
        sqlx::query_as("SELECT * FROM stage_records WHERE order_id = $1 AND completed_at IS NULL ORDER BY id DESC")
            .bind(order_id.as_str())
            .fetch_optional(conn)
            .await?;
    Ok(record)
}
