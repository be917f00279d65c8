use log::*;

use crate::{
    api::{
        errors::AccountApiError,
        order_objects::{OrderDetail, OrderQueryFilter, OrderResult},
    },
    db_types::{Message, Order, OrderId, Role},
    policy::{authorize, Action, Actor},
    traits::OrderManagement,
};

/// `AccountApi` provides role-scoped read access to orders, stage histories, messages and files.
///
/// Reads that the caller has no visibility into come back as `None`/empty rather than as an error, so an
/// outsider cannot distinguish "does not exist" from "not yours".
#[derive(Debug, Clone)]
pub struct AccountApi<B> {
    db: B,
}

impl<B> AccountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> AccountApi<B>
where B: OrderManagement
{
    /// The orders visible to this actor: everything for admins, assigned orders for writers, own orders
    /// for clients.
    pub async fn orders_for_actor(&self, actor: &Actor) -> Result<OrderResult, AccountApiError> {
        authorize(actor, Action::ListOwnOrders, None)?;
        let orders = if actor.is_admin() {
            self.db.search_orders(OrderQueryFilter::default()).await?
        } else if actor.roles.contains(Role::Writer) {
            let writer_id = actor.user_id.as_deref().unwrap_or_default();
            self.db.orders_for_writer(writer_id).await?
        } else {
            let user_id = actor.user_id.as_deref().unwrap_or_default();
            let email = actor.email.as_deref().unwrap_or_default();
            self.db.orders_for_client(user_id, email).await?
        };
        trace!("🗂️ {} orders visible to {:?}", orders.len(), actor.user_id);
        Ok(OrderResult::new(orders))
    }

    /// The order with its stage history and attachments, or `None` when it does not exist or the actor
    /// may not see it.
    pub async fn order_detail(&self, actor: &Actor, order_id: &OrderId) -> Result<Option<OrderDetail>, AccountApiError> {
        let Some(order) = self.db.fetch_order_by_order_id(order_id).await? else {
            return Ok(None);
        };
        if authorize(actor, Action::ViewOrder, Some(&order)).is_err() {
            debug!("🗂️ Order {order_id} exists but is not visible to {:?}", actor.user_id);
            return Ok(None);
        }
        let stages = self.db.fetch_stage_history(order_id).await?;
        let files = self.db.fetch_files(order_id).await?;
        Ok(Some(OrderDetail { order, stages, files }))
    }

    /// All messages on an order, oldest first, or `None` when the order is not visible.
    pub async fn messages_for_order(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<Option<Vec<Message>>, AccountApiError> {
        let Some(order) = self.db.fetch_order_by_order_id(order_id).await? else {
            return Ok(None);
        };
        if authorize(actor, Action::ViewOrder, Some(&order)).is_err() {
            return Ok(None);
        }
        let messages = self.db.fetch_messages(order_id).await?;
        Ok(Some(messages))
    }

    /// Admin search across all orders.
    pub async fn search_orders(&self, actor: &Actor, query: OrderQueryFilter) -> Result<Vec<Order>, AccountApiError> {
        authorize(actor, Action::SearchOrders, None)?;
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    /// Raw order fetch without a visibility filter. Admin paths only; prefer [`Self::order_detail`].
    pub async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, AccountApiError> {
        self.db.fetch_order_by_order_id(order_id).await
    }
}
