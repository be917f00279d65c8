use sqlx::SqliteConnection;

use crate::db_types::{Message, NewMessage, OrderId};

/// Appends a message to the order's conversation. Ordering is by the autoincrement id, which also orders
/// `created_at` since both are assigned server-side at insert time.
pub async fn insert_message(message: NewMessage, conn: &mut SqliteConnection) -> Result<Message, sqlx::Error> {
    let message = sqlx::query_as(
        "INSERT INTO messages (order_id, sender_id, body) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(message.order_id)
    .bind(message.sender_id)
    .bind(message.body)
    .fetch_one(conn)
    .await?;
    Ok(message)
}

pub async fn fetch_messages(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Message>, sqlx::Error> {
    let messages = sqlx::query_as("SELECT * FROM messages WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(messages)
}
