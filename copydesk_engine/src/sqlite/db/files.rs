use sqlx::SqliteConnection;

use crate::db_types::{NewOrderFile, OrderFile, OrderId};

/// Records file metadata. The unique constraint on `storage_path` surfaces as a database error that the
/// caller maps to a conflict.
pub async fn insert_file(
    file: NewOrderFile,
    storage_path: &str,
    conn: &mut SqliteConnection,
) -> Result<OrderFile, sqlx::Error> {
    let file = sqlx::query_as(
        "INSERT INTO order_files (order_id, uploader_id, storage_path, file_name, content_type) VALUES ($1, $2, $3, \
         $4, $5) RETURNING *",
    )
    .bind(file.order_id)
    .bind(file.uploader_id)
    .bind(storage_path)
    .bind(file.file_name)
    .bind(file.content_type)
    .fetch_one(conn)
    .await?;
    Ok(file)
}

pub async fn fetch_files(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderFile>, sqlx::Error> {
    let files = sqlx::query_as("SELECT * FROM order_files WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(files)
}

pub async fn fetch_file_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderFile>, sqlx::Error> {
    let file = sqlx::query_as("SELECT * FROM order_files WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(file)
}
