use std::fmt::Debug;

use chrono::{Duration, Utc};
use cpd_common::UsdCents;
use log::*;

use crate::{
    db_types::{
        Message,
        NewMessage,
        NewOrder,
        NewOrderFile,
        Order,
        OrderFile,
        OrderId,
        PaymentConfirmation,
        SubmittedWork,
    },
    events::{
        EventProducers,
        MessagePostedEvent,
        OrderAnnulledEvent,
        OrderCreatedEvent,
        OrderPaidEvent,
        StageAdvancedEvent,
    },
    helpers::{object_path, quote_price, validate_new_order, ValidationError},
    messaging::MessageFeed,
    policy::{authorize, Action, Actor},
    traits::{WorkflowError, WorkflowManagement},
};

/// `OrderFlowApi` is the primary API for everything that changes an order: creation, assignment,
/// submission, review, messaging, payment confirmation and expiry. Every method checks the access policy
/// before touching storage, and publishes the corresponding engine events afterwards.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    feed: MessageFeed,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, feed: MessageFeed) -> Self {
        Self { db, producers, feed }
    }
}

impl<B> OrderFlowApi<B>
where B: WorkflowManagement
{
    /// Submit a new order.
    ///
    /// Anonymous callers are allowed: orders are keyed on the client email until the client registers and
    /// links them. The price is computed here from the engine's rate table — any client-side estimate is
    /// ignored — and the initial `pending_payment` stage is opened.
    pub async fn process_new_order(&self, actor: &Actor, order: NewOrder) -> Result<Order, WorkflowError> {
        authorize(actor, Action::CreateOrder, None)?;
        validate_new_order(&order)?;
        let now = Utc::now();
        let price = quote_price(order.content_type, order.word_count, order.deadline);
        let due_at = order.deadline.due_from(now);
        let order = self.db.insert_order(order, price, due_at).await?;
        debug!("🔄️📦️ Order {} (#{}) created at {price}", order.order_id, order.order_number);
        self.call_order_created_hook(&order).await;
        Ok(order)
    }

    /// Attach a writer to a paid order with the agreed price and deadline, moving it to `writing`.
    ///
    /// Admin only. The writer must hold the writer role with an approved application, the price must be
    /// positive and the deadline strictly in the future. A second concurrent assignment loses the
    /// compare-and-swap and surfaces as a conflict.
    pub async fn assign_writer(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        writer_id: &str,
        price: UsdCents,
        deadline: chrono::DateTime<Utc>,
    ) -> Result<Order, WorkflowError> {
        authorize(actor, Action::AssignWriter, None)?;
        if price <= UsdCents::from(0) {
            return Err(ValidationError::new("writer_price", "must be greater than zero").into());
        }
        if deadline <= Utc::now() {
            return Err(ValidationError::new("writer_deadline", "must be in the future").into());
        }
        let order = self.db.assign_writer(order_id, writer_id, price, deadline).await?;
        debug!("🔄️📦️ Writer {writer_id} assigned to order {order_id} for {price}");
        self.call_stage_advanced_hook(&order, crate::db_types::OrderStatusType::InProgress).await;
        Ok(order)
    }

    /// Record the assigned writer's deliverable and move the order to `in_review`.
    ///
    /// Requires at least one of free-text content or an attached file reference.
    pub async fn submit_work(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        work: SubmittedWork,
    ) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        authorize(actor, Action::SubmitWork, Some(&order))?;
        if work.is_empty() {
            return Err(ValidationError::new("submission", "either content or a file reference is required").into());
        }
        let writer_id = order.writer_id.as_deref().unwrap_or_default().to_string();
        let order = self.db.submit_work(order_id, &writer_id, &work).await?;
        debug!("🔄️📦️ Order {order_id} submitted for review");
        self.call_stage_advanced_hook(&order, crate::db_types::OrderStatusType::Writing).await;
        Ok(order)
    }

    /// Send an order in review back to the writer, carrying the admin's notes.
    pub async fn request_revision(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        notes: &str,
    ) -> Result<Order, WorkflowError> {
        authorize(actor, Action::RequestRevision, None)?;
        let order = self.db.request_revision(order_id, notes).await?;
        debug!("🔄️📦️ Order {order_id} sent back for revision");
        self.call_stage_advanced_hook(&order, crate::db_types::OrderStatusType::InReview).await;
        Ok(order)
    }

    /// Approve the submitted work and close the order. Terminal.
    pub async fn approve_and_complete(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, WorkflowError> {
        authorize(actor, Action::ApproveOrder, None)?;
        let order = self.db.approve_and_complete(order_id).await?;
        info!("🔄️📦️ Order {order_id} (#{}) completed", order.order_number);
        self.call_stage_advanced_hook(&order, crate::db_types::OrderStatusType::InReview).await;
        Ok(order)
    }

    /// Cancel an order that has not entered writing yet. Terminal.
    pub async fn cancel_order(&self, actor: &Actor, order_id: &OrderId, reason: &str) -> Result<Order, WorkflowError> {
        authorize(actor, Action::CancelOrder, None)?;
        let order = self.db.cancel_order(order_id, reason).await?;
        info!("🔄️📦️ Order {order_id} cancelled: {reason}");
        self.call_order_annulled_hook(std::slice::from_ref(&order)).await;
        Ok(order)
    }

    /// Apply a verified payment confirmation from the checkout provider.
    ///
    /// No actor: authenticity has been established by the webhook signature. Replays of an already
    /// processed event id return `Ok(None)` and change nothing.
    pub async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> Result<Option<Order>, WorkflowError> {
        let event_id = confirmation.event_id.clone();
        match self.db.mark_order_paid(confirmation).await? {
            Some(order) => {
                info!("🔄️💰️ Payment confirmed for order {} (#{})", order.order_id, order.order_number);
                self.call_order_paid_hook(&order).await;
                self.call_stage_advanced_hook(&order, crate::db_types::OrderStatusType::PendingPayment).await;
                Ok(Some(order))
            },
            None => {
                debug!("🔄️💰️ Payment event {event_id} already processed; ignoring replay");
                Ok(None)
            },
        }
    }

    /// Cancel orders stuck in `pending_payment` for longer than `pending_limit`.
    pub async fn expire_stale_orders(&self, pending_limit: Duration) -> Result<Vec<Order>, WorkflowError> {
        let expired = self.db.expire_stale_orders(pending_limit).await?;
        if !expired.is_empty() {
            info!("🔄️🕰️ {} stale pending-payment orders cancelled", expired.len());
            self.call_order_annulled_hook(&expired).await;
        }
        Ok(expired)
    }

    /// Link anonymous orders carrying the caller's verified email to their account.
    pub async fn link_orders(&self, actor: &Actor) -> Result<u64, WorkflowError> {
        authorize(actor, Action::LinkOrders, None)?;
        let (user_id, email) = match (&actor.user_id, &actor.email) {
            (Some(uid), Some(email)) => (uid.clone(), email.clone()),
            _ => return Err(ValidationError::new("identity", "a verified email is required to link orders").into()),
        };
        let linked = self.db.link_orders_to_client(&email, &user_id).await?;
        debug!("🔄️📦️ Linked {linked} orders to account {user_id}");
        Ok(linked)
    }

    /// Append a message to an order's conversation and fan it out to live subscribers.
    pub async fn post_message(&self, actor: &Actor, message: NewMessage) -> Result<Message, WorkflowError> {
        let order = self.fetch_order(&message.order_id).await?;
        authorize(actor, Action::PostMessage, Some(&order))?;
        if message.body.trim().is_empty() {
            return Err(ValidationError::new("body", "must not be empty").into());
        }
        let message = self.db.post_message(message).await?;
        trace!("🔄️📨️ Message {} posted on order {}", message.id, message.order_id);
        self.feed.publish(&message);
        self.call_message_posted_hook(&message).await;
        Ok(message)
    }

    /// Record a file attachment for an order. The storage path is namespaced by uploader and order; the
    /// caller uploads the bytes to object storage separately, and is responsible for removing the orphan
    /// if this call fails.
    pub async fn attach_file(&self, actor: &Actor, file: NewOrderFile) -> Result<OrderFile, WorkflowError> {
        let order = self.fetch_order(&file.order_id).await?;
        authorize(actor, Action::AttachFile, Some(&order))?;
        let path = object_path(&file.uploader_id, &file.order_id, &file.file_name)?;
        let file = self.db.attach_file(file, &path).await?;
        debug!("🔄️📎️ File {} attached to order {}", file.file_name, file.order_id);
        Ok(file)
    }

    /// Subscribe to the live message feed for an order, subject to read access.
    pub async fn subscribe_messages(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<crate::messaging::MessageSubscription, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        authorize(actor, Action::ViewOrder, Some(&order))?;
        Ok(self.feed.subscribe(order_id))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, WorkflowError> {
        self.db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_stage_advanced_hook(&self, order: &Order, from: crate::db_types::OrderStatusType) {
        for emitter in &self.producers.stage_advanced_producer {
            emitter.publish_event(StageAdvancedEvent::new(order.clone(), from, order.status)).await;
        }
    }

    async fn call_order_annulled_hook(&self, orders: &[Order]) {
        for emitter in &self.producers.order_annulled_producer {
            for order in orders {
                emitter.publish_event(OrderAnnulledEvent::new(order.clone())).await;
            }
        }
    }

    async fn call_message_posted_hook(&self, message: &Message) {
        for emitter in &self.producers.message_posted_producer {
            emitter.publish_event(MessagePostedEvent::new(message.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
