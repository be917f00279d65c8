use chrono::{DateTime, Duration, Utc};
use cpd_common::UsdCents;
use thiserror::Error;

use crate::{
    api::errors::{AccountApiError, AuthApiError, WriterApiError},
    db_types::{
        Message,
        NewMessage,
        NewOrder,
        NewOrderFile,
        Order,
        OrderFile,
        OrderId,
        OrderStatusType,
        PaymentConfirmation,
        SubmittedWork,
    },
    helpers::ValidationError,
    policy::PolicyError,
};

/// The highest level of behaviour for backends supporting the Copydesk engine: every durable state change
/// passes through here, and each method is one atomic transaction — either the whole transition applies
/// (status, stage record close/open, timestamps) or nothing does.
#[allow(async_fn_in_trait)]
pub trait WorkflowManagement: Clone + crate::traits::OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order with the engine-computed price and deadline, assigns the next sequential order
    /// number, and opens the initial `pending_payment` stage.
    async fn insert_order(
        &self,
        order: NewOrder,
        price: UsdCents,
        due_at: DateTime<Utc>,
    ) -> Result<Order, WorkflowError>;

    /// Moves an order from `from` to `to` in a single transaction: closes the open stage record, opens a
    /// new one carrying `notes`, and updates the status.
    ///
    /// The status update is a compare-and-swap on `from`. When the order's current status differs the call
    /// fails with [`WorkflowError::StaleState`] and nothing is written, so the caller can refetch and
    /// retry. A `(from, to)` pair outside the state machine table fails with
    /// [`WorkflowError::TransitionForbidden`] before touching the database.
    async fn advance_stage(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        notes: Option<&str>,
    ) -> Result<Order, WorkflowError>;

    /// Attaches a writer with the agreed price and deadline and advances `in_progress → writing`.
    ///
    /// Fails with [`WorkflowError::Conflict`] if a writer is already attached — reassignment is
    /// deliberately not supported, so a writer can never change silently mid-job. Under two concurrent
    /// assignments the stage compare-and-swap guarantees at most one winner.
    async fn assign_writer(
        &self,
        order_id: &OrderId,
        writer_id: &str,
        price: UsdCents,
        deadline: DateTime<Utc>,
    ) -> Result<Order, WorkflowError>;

    /// Records the writer's deliverable and advances `writing → in_review`. When `work.file_id` is set,
    /// the file must already be attached to this order.
    async fn submit_work(
        &self,
        order_id: &OrderId,
        writer_id: &str,
        work: &SubmittedWork,
    ) -> Result<Order, WorkflowError>;

    /// Advances `in_review → revision` and immediately reopens `writing`, carrying `notes` into the
    /// revision stage record for the writer to read.
    async fn request_revision(&self, order_id: &OrderId, notes: &str) -> Result<Order, WorkflowError>;

    /// Advances `in_review → completed`. Terminal.
    async fn approve_and_complete(&self, order_id: &OrderId) -> Result<Order, WorkflowError>;

    /// Cancels an order that has not started writing yet. Terminal.
    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, WorkflowError>;

    /// Applies a verified payment confirmation: `pending_payment → in_progress`.
    ///
    /// Idempotent by event id: a replayed confirmation returns `Ok(None)` without touching the order.
    /// The confirmation's amount must match the order's stored price.
    async fn mark_order_paid(&self, confirmation: PaymentConfirmation) -> Result<Option<Order>, WorkflowError>;

    /// Cancels orders that have sat in `pending_payment` for longer than `pending_limit` (based on
    /// `updated_at`). Returns the orders that were cancelled.
    async fn expire_stale_orders(&self, pending_limit: Duration) -> Result<Vec<Order>, WorkflowError>;

    /// Links anonymous orders carrying the verified `email` to the account `user_id`. Returns how many
    /// orders were linked. Orders already linked to a different account are left alone.
    async fn link_orders_to_client(&self, email: &str, user_id: &str) -> Result<u64, WorkflowError>;

    /// Records file metadata under the pre-computed storage path. Fails with
    /// [`WorkflowError::Conflict`] if the path is already taken.
    async fn attach_file(&self, file: NewOrderFile, storage_path: &str) -> Result<OrderFile, WorkflowError>;

    /// Appends a message to the order's conversation. Ordering is by insertion.
    async fn post_message(&self, message: NewMessage) -> Result<Message, WorkflowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), WorkflowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Forbidden(#[from] PolicyError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No file with id {0} is attached to this order")]
    FileNotFound(i64),
    #[error("Conflicting order state: {0}")]
    Conflict(String),
    #[error("Stale order state: expected {expected}, found {actual}")]
    StaleState { expected: OrderStatusType, actual: OrderStatusType },
    #[error("The transition {from} -> {to} is not permitted")]
    TransitionForbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Writer is not eligible: {0}")]
    WriterNotEligible(String),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
    #[error("{0}")]
    AuthError(#[from] AuthApiError),
    #[error("{0}")]
    WriterError(#[from] WriterApiError),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        WorkflowError::DatabaseError(e.to_string())
    }
}
