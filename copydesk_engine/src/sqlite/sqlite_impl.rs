//! `SqliteDatabase` is a concrete implementation of a Copydesk engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Each mutation runs inside a single transaction, so a failed multi-step
//! operation (status update, stage record close/open) never leaves partial state behind.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use cpd_common::UsdCents;
use log::*;
use sqlx::SqlitePool;

use super::db::{applications, db_url, files, messages, new_pool, orders, profiles, stages, webhook_events};
use crate::{
    api::errors::{AccountApiError, AuthApiError, WriterApiError},
    db_types::{
        ApplicationStatus,
        Message,
        NewMessage,
        NewOrder,
        NewOrderFile,
        NewProfile,
        NewWriterApplication,
        Order,
        OrderFile,
        OrderId,
        OrderStatusType,
        PaymentConfirmation,
        Profile,
        Role,
        Roles,
        StageRecord,
        SubmittedWork,
        WriterApplication,
    },
    helpers::ValidationError,
    order_fsm,
    order_objects::OrderQueryFilter,
    traits::{AuthManagement, OrderManagement, WorkflowError, WorkflowManagement, WriterManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl WorkflowManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(
        &self,
        order: NewOrder,
        price: UsdCents,
        due_at: DateTime<Utc>,
    ) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, price, due_at, &mut tx).await?;
        stages::open_stage(&order.order_id, OrderStatusType::PendingPayment, Some("Order received"), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} stored as #{} at {price}", order.order_id, order.order_number);
        Ok(order)
    }

    async fn advance_stage(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        notes: Option<&str>,
    ) -> Result<Order, WorkflowError> {
        if !order_fsm::is_allowed(from, to) {
            return Err(WorkflowError::TransitionForbidden { from, to });
        }
        let mut tx = self.pool.begin().await?;
        let order = match orders::cas_update_status(order_id, from, to, &mut tx).await? {
            Some(order) => order,
            None => return Err(stale_or_missing(order_id, from, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        stages::open_stage(order_id, to, notes, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} advanced {from} -> {to}");
        Ok(order)
    }

    async fn assign_writer(
        &self,
        order_id: &OrderId,
        writer_id: &str,
        price: UsdCents,
        deadline: DateTime<Utc>,
    ) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        // Eligibility: the writer role plus an approved application, checked inside the same transaction
        // as the assignment itself.
        let roles = match profiles::roles_for_user(writer_id, &mut tx).await {
            Ok(roles) => roles,
            Err(AuthApiError::UserNotFound) => {
                return Err(WorkflowError::WriterNotEligible(format!("no profile found for {writer_id}")))
            },
            Err(e) => return Err(e.into()),
        };
        if !roles.contains(Role::Writer) {
            return Err(WorkflowError::WriterNotEligible(format!("{writer_id} does not hold the writer role")));
        }
        if !applications::has_approved_application(writer_id, &mut tx).await? {
            return Err(WorkflowError::WriterNotEligible(format!("{writer_id} has no approved application")));
        }
        let current = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))?;
        if current.writer_id.is_some() {
            return Err(WorkflowError::Conflict(format!("a writer is already assigned to order {order_id}")));
        }
        let order = match orders::attach_writer(order_id, writer_id, price, deadline, &mut tx).await? {
            Some(order) => order,
            // The guarded update found no row: either the status moved or a rival assignment won the race
            // between our fetch and the update.
            None => return Err(stale_or_missing(order_id, OrderStatusType::InProgress, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        let note = format!("Writer assigned at {price}");
        stages::open_stage(order_id, OrderStatusType::Writing, Some(&note), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Writer {writer_id} attached to order {order_id}");
        Ok(order)
    }

    async fn submit_work(
        &self,
        order_id: &OrderId,
        writer_id: &str,
        work: &SubmittedWork,
    ) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        if let Some(file_id) = work.file_id {
            let file = files::fetch_file_by_id(file_id, &mut tx)
                .await?
                .filter(|f| &f.order_id == order_id)
                .ok_or(WorkflowError::FileNotFound(file_id))?;
            trace!("🗃️ Submission references file {} ({})", file.id, file.file_name);
        }
        let current = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))?;
        if current.writer_id.as_deref() != Some(writer_id) {
            return Err(WorkflowError::Conflict(format!("{writer_id} is not the assigned writer of {order_id}")));
        }
        let order = match orders::cas_update_status(order_id, OrderStatusType::Writing, OrderStatusType::InReview, &mut tx)
            .await?
        {
            Some(order) => order,
            None => return Err(stale_or_missing(order_id, OrderStatusType::Writing, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        let notes = work.content.clone().unwrap_or_else(|| "Work submitted as file attachment".to_string());
        stages::open_stage(order_id, OrderStatusType::InReview, Some(&notes), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved to review");
        Ok(order)
    }

    async fn request_revision(&self, order_id: &OrderId, notes: &str) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        if orders::cas_update_status(order_id, OrderStatusType::InReview, OrderStatusType::Revision, &mut tx)
            .await?
            .is_none()
        {
            return Err(stale_or_missing(order_id, OrderStatusType::InReview, &mut tx).await);
        }
        stages::close_open_stage(order_id, &mut tx).await?;
        stages::open_stage(order_id, OrderStatusType::Revision, Some(notes), &mut tx).await?;
        // The revision stage exists to carry the notes; the order reopens for the writer immediately.
        let order = match orders::cas_update_status(order_id, OrderStatusType::Revision, OrderStatusType::Writing, &mut tx)
            .await?
        {
            Some(order) => order,
            None => return Err(stale_or_missing(order_id, OrderStatusType::Revision, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        stages::open_stage(order_id, OrderStatusType::Writing, Some("Reopened after revision request"), &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} reopened for revision");
        Ok(order)
    }

    async fn approve_and_complete(&self, order_id: &OrderId) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::cas_update_status(
            order_id,
            OrderStatusType::InReview,
            OrderStatusType::Completed,
            &mut tx,
        )
        .await?
        {
            Some(order) => order,
            None => return Err(stale_or_missing(order_id, OrderStatusType::InReview, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        stages::open_stage(order_id, OrderStatusType::Completed, Some("Approved"), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} completed");
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        let current = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))?;
        let from = current.status;
        if !order_fsm::is_allowed(from, OrderStatusType::Cancelled) {
            return Err(WorkflowError::TransitionForbidden { from, to: OrderStatusType::Cancelled });
        }
        let order = match orders::cas_update_status(order_id, from, OrderStatusType::Cancelled, &mut tx).await? {
            Some(order) => order,
            None => return Err(stale_or_missing(order_id, from, &mut tx).await),
        };
        stages::close_open_stage(order_id, &mut tx).await?;
        stages::open_stage(order_id, OrderStatusType::Cancelled, Some(reason), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} cancelled");
        Ok(order)
    }

    async fn mark_order_paid(&self, confirmation: PaymentConfirmation) -> Result<Option<Order>, WorkflowError> {
        let PaymentConfirmation { event_id, order_id, amount } = confirmation;
        let mut tx = self.pool.begin().await?;
        let fresh = webhook_events::record_event_if_new(&event_id, "payment.succeeded", &order_id, amount, &mut tx)
            .await?;
        if !fresh {
            debug!("🗃️ Webhook event {event_id} already processed; no transition performed");
            return Ok(None);
        }
        let order = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))?;
        if order.client_price != amount {
            // Do not commit the event record: a later, correctly-priced delivery must still be able to pay.
            tx.rollback().await?;
            return Err(ValidationError::new(
                "amount",
                format!("payment of {amount} does not match the order price {}", order.client_price),
            )
            .into());
        }
        let order = match orders::cas_update_status(
            &order_id,
            OrderStatusType::PendingPayment,
            OrderStatusType::InProgress,
            &mut tx,
        )
        .await?
        {
            Some(order) => order,
            None => return Err(stale_or_missing(&order_id, OrderStatusType::PendingPayment, &mut tx).await),
        };
        stages::close_open_stage(&order_id, &mut tx).await?;
        stages::open_stage(&order_id, OrderStatusType::InProgress, Some("Payment received"), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment event {event_id} applied to order {order_id}");
        Ok(Some(order))
    }

    async fn expire_stale_orders(&self, pending_limit: Duration) -> Result<Vec<Order>, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        let stale = orders::stale_pending_orders(pending_limit, &mut tx).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            let oid = &order.order_id;
            if let Some(order) =
                orders::cas_update_status(oid, OrderStatusType::PendingPayment, OrderStatusType::Cancelled, &mut tx)
                    .await?
            {
                stages::close_open_stage(oid, &mut tx).await?;
                stages::open_stage(oid, OrderStatusType::Cancelled, Some("Payment window expired"), &mut tx).await?;
                expired.push(order);
            }
        }
        tx.commit().await?;
        if !expired.is_empty() {
            debug!("🗃️ {} stale orders cancelled", expired.len());
        }
        Ok(expired)
    }

    async fn link_orders_to_client(&self, email: &str, user_id: &str) -> Result<u64, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let linked = orders::link_orders_to_client(email, user_id, &mut conn).await?;
        Ok(linked)
    }

    async fn attach_file(&self, file: NewOrderFile, storage_path: &str) -> Result<OrderFile, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let file = files::insert_file(file, storage_path, &mut conn).await.map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                WorkflowError::Conflict(format!("a file already exists at {storage_path}"))
            },
            _ => WorkflowError::from(e),
        })?;
        Ok(file)
    }

    async fn post_message(&self, message: NewMessage) -> Result<Message, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let message = messages::insert_message(message, &mut conn).await?;
        Ok(message)
    }

    async fn close(&mut self) -> Result<(), WorkflowError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Maps a failed guarded update to the right error: the order is either gone or in a different status
/// than the caller expected.
async fn stale_or_missing(
    order_id: &OrderId,
    expected: OrderStatusType,
    conn: &mut sqlx::SqliteConnection,
) -> WorkflowError {
    match orders::fetch_order_by_order_id(order_id, conn).await {
        Ok(Some(order)) => {
            warn!("🗃️ Order {order_id} is {}, not {expected}; transition rejected", order.status);
            WorkflowError::StaleState { expected, actual: order.status }
        },
        Ok(None) => WorkflowError::OrderNotFound(order_id.clone()),
        Err(e) => WorkflowError::from(e),
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: i64) -> Result<Option<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn orders_for_client(&self, user_id: &str, email: &str) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::orders_for_client(user_id, email, &mut conn).await?;
        Ok(orders)
    }

    async fn orders_for_writer(&self, writer_id: &str) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::orders_for_writer(writer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_stage_history(&self, order_id: &OrderId) -> Result<Vec<StageRecord>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let records = stages::stage_history(order_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_messages(&self, order_id: &OrderId) -> Result<Vec<Message>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let messages = messages::fetch_messages(order_id, &mut conn).await?;
        Ok(messages)
    }

    async fn fetch_files(&self, order_id: &OrderId) -> Result<Vec<OrderFile>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let files = files::fetch_files(order_id, &mut conn).await?;
        Ok(files)
    }
}

impl AuthManagement for SqliteDatabase {
    async fn upsert_profile(&self, profile: NewProfile) -> Result<Profile, AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::upsert_profile(profile, &mut conn).await
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::fetch_profile(user_id, &mut conn).await
    }

    async fn check_user_has_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::user_has_roles(user_id, roles, &mut conn).await
    }

    async fn fetch_roles_for_user(&self, user_id: &str) -> Result<Roles, AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::roles_for_user(user_id, &mut conn).await
    }

    async fn assign_roles(&self, user_id: &str, roles: &[Role]) -> Result<(), AuthApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::assign_roles(user_id, roles, &mut tx).await?;
        tx.commit().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        debug!("🔑️ Roles {roles:?} assigned to {user_id}");
        Ok(())
    }

    async fn remove_roles(&self, user_id: &str, roles: &[Role]) -> Result<u64, AuthApiError> {
        let mut tx = self.pool.begin().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        let removed = profiles::remove_roles(user_id, roles, &mut tx).await?;
        tx.commit().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        Ok(removed)
    }

    async fn upsert_nonce_for_user(&self, user_id: &str, nonce: u64) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| AuthApiError::DatabaseError(e.to_string()))?;
        profiles::upsert_nonce_for_user(user_id, nonce, &mut conn).await
    }
}

impl WriterManagement for SqliteDatabase {
    async fn submit_application(&self, application: NewWriterApplication) -> Result<WriterApplication, WriterApiError> {
        let mut tx = self.pool.begin().await?;
        let application = applications::insert_application(application, &mut tx).await?;
        tx.commit().await?;
        Ok(application)
    }

    async fn fetch_application(&self, id: i64) -> Result<Option<WriterApplication>, WriterApiError> {
        let mut conn = self.pool.acquire().await?;
        applications::fetch_application(id, &mut conn).await
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<WriterApplication>, WriterApiError> {
        let mut conn = self.pool.acquire().await?;
        applications::list_applications(status, &mut conn).await
    }

    async fn decide_application(&self, id: i64, approve: bool) -> Result<WriterApplication, WriterApiError> {
        let new_status = if approve { ApplicationStatus::Approved } else { ApplicationStatus::Rejected };
        let mut tx = self.pool.begin().await?;
        let application = applications::decide_application(id, new_status, &mut tx).await?;
        if approve {
            profiles::assign_roles(&application.user_id, &[Role::Writer], &mut tx)
                .await
                .map_err(|e| WriterApiError::DatabaseError(e.to_string()))?;
        }
        tx.commit().await?;
        Ok(application)
    }

    async fn list_approved_writers(&self) -> Result<Vec<Profile>, WriterApiError> {
        let mut conn = self.pool.acquire().await?;
        applications::approved_writers(&mut conn).await
    }
}
