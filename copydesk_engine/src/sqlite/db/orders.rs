use chrono::{DateTime, Duration, Utc};
use cpd_common::UsdCents;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::WorkflowError,
};

/// Inserts a new order using the given connection. This is not atomic on its own; embed the call inside a
/// transaction and pass `&mut *tx` as the connection argument. The sequential order number is taken from
/// the current maximum inside the same statement, which is safe because SQLite serialises writers.
pub async fn insert_order(
    order: NewOrder,
    price: UsdCents,
    due_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, WorkflowError> {
    let order_id = OrderId::random();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                order_number,
                client_email,
                content_type,
                word_count,
                title,
                description,
                keywords,
                expertise,
                deadline,
                due_at,
                client_price
            ) VALUES ($1, (SELECT COALESCE(MAX(order_number), 1000) + 1 FROM orders), $2, $3, $4, $5, $6, $7, $8, $9,
                      $10, $11)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(order.client_email)
    .bind(order.content_type)
    .bind(order.word_count)
    .bind(order.title)
    .bind(order.description)
    .bind(order.keywords)
    .bind(order.expertise)
    .bind(order.deadline)
    .bind(due_at)
    .bind(price.value())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order {} inserted as #{}", order.order_id, order.order_number);
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    order_number: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(order_number).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.to_string());
    }
    if let Some(n) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(n);
    }
    if let Some(email) = query.client_email {
        where_clause.push("lower(client_email) = lower(");
        where_clause.push_bind_unseparated(email);
        where_clause.push_unseparated(")");
    }
    if let Some(cid) = query.client_id {
        where_clause.push("client_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(wid) = query.writer_id {
        where_clause.push("writer_id = ");
        where_clause.push_bind_unseparated(wid);
    }
    if let Some(ct) = query.content_type {
        where_clause.push("content_type = ");
        where_clause.push_bind_unseparated(ct.to_string());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Orders visible to a client: those linked to their account, plus anonymous orders still carrying their
/// verified email.
pub async fn orders_for_client(
    user_id: &str,
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE client_id = $1 OR (client_id IS NULL AND lower(client_email) = lower($2))
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(email)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn orders_for_writer(writer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE writer_id = $1 ORDER BY created_at ASC")
        .bind(writer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Compare-and-swap status update. Returns `None` when the order's current status is not `from` (or the
/// order does not exist) — the caller distinguishes the two and maps to the right error.
pub async fn cas_update_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 \
         RETURNING *",
    )
    .bind(to)
    .bind(order_id.as_str())
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Attaches the writer and advances `in_progress → writing` in one guarded update. The `writer_id IS
/// NULL` condition is what makes two concurrent assignments resolve to exactly one winner.
pub async fn attach_writer(
    order_id: &OrderId,
    writer_id: &str,
    price: UsdCents,
    deadline: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
        UPDATE orders SET
            writer_id = $1,
            writer_price = $2,
            writer_deadline = $3,
            status = 'writing',
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $4 AND writer_id IS NULL AND status = 'in_progress'
        RETURNING *
        "#,
    )
    .bind(writer_id)
    .bind(price.value())
    .bind(deadline)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Links anonymous orders carrying `email` to the account `user_id`. Orders already linked to another
/// account are untouched.
pub async fn link_orders_to_client(
    email: &str,
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET client_id = $1, updated_at = CURRENT_TIMESTAMP WHERE client_id IS NULL AND \
         lower(client_email) = lower($2)",
    )
    .bind(user_id)
    .bind(email)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Orders that have sat in `pending_payment` longer than `limit`, based on `updated_at`.
pub async fn stale_pending_orders(limit: Duration, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as(
        format!(
            "SELECT * FROM orders WHERE status = 'pending_payment' AND (unixepoch(CURRENT_TIMESTAMP) - \
             unixepoch(updated_at)) > {}",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
