use crate::{
    api::{errors::AccountApiError, order_objects::OrderQueryFilter},
    db_types::{Message, Order, OrderFile, OrderId, StageRecord},
};

/// Read-side access to orders and their attachments. Visibility filtering by role happens in the API
/// layer; these methods return whatever matches.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError>;

    async fn fetch_order_by_number(&self, order_number: i64) -> Result<Option<Order>, AccountApiError>;

    /// Fetches orders according to criteria specified in the filter, ordered by `created_at` ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError>;

    /// Orders belonging to a client: linked to `user_id`, or still anonymous but carrying `email`.
    async fn orders_for_client(&self, user_id: &str, email: &str) -> Result<Vec<Order>, AccountApiError>;

    /// Orders where `writer_id` is the attached writer.
    async fn orders_for_writer(&self, writer_id: &str) -> Result<Vec<Order>, AccountApiError>;

    /// The full stage history of an order, oldest first.
    async fn fetch_stage_history(&self, order_id: &OrderId) -> Result<Vec<StageRecord>, AccountApiError>;

    /// All messages on an order, in insertion order.
    async fn fetch_messages(&self, order_id: &OrderId) -> Result<Vec<Message>, AccountApiError>;

    /// All file attachments on an order, oldest first.
    async fn fetch_files(&self, order_id: &OrderId) -> Result<Vec<OrderFile>, AccountApiError>;
}
