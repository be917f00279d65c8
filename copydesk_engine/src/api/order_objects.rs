use std::fmt::Display;

use chrono::{DateTime, Utc};
use cpd_common::UsdCents;
use serde::{Deserialize, Serialize};

use crate::{
    api::errors::AccountApiError,
    db_types::{ContentType, Order, OrderFile, OrderId, OrderStatusType, StageRecord},
};

/// A role-scoped order listing with its total value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub total_value: UsdCents,
    pub orders: Vec<Order>,
}

impl OrderResult {
    pub fn new(orders: Vec<Order>) -> Self {
        let total_value = orders.iter().map(|o| o.client_price).sum();
        Self { total_value, orders }
    }
}

/// An order together with its stage history and attachments, as shown on the order detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub stages: Vec<StageRecord>,
    pub files: Vec<OrderFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub order_number: Option<i64>,
    pub client_email: Option<String>,
    pub client_id: Option<String>,
    pub writer_id: Option<String>,
    pub content_type: Option<ContentType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_order_number(mut self, order_number: i64) -> Self {
        self.order_number = Some(order_number);
        self
    }

    pub fn with_client_email<S: Into<String>>(mut self, email: S) -> Self {
        self.client_email = Some(email.into());
        self
    }

    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_writer_id<S: Into<String>>(mut self, writer_id: S) -> Self {
        self.writer_id = Some(writer_id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, AccountApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| AccountApiError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, AccountApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| AccountApiError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.order_number.is_none()
            && self.client_email.is_none()
            && self.client_id.is_none()
            && self.writer_id.is_none()
            && self.content_type.is_none()
            && self.since.is_none()
            && self.until.is_none()
            && self.status.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(n) = &self.order_number {
            write!(f, "order_number: {n}. ")?;
        }
        if let Some(email) = &self.client_email {
            write!(f, "client_email: {email}. ")?;
        }
        if let Some(cid) = &self.client_id {
            write!(f, "client_id: {cid}. ")?;
        }
        if let Some(wid) = &self.writer_id {
            write!(f, "writer_id: {wid}. ")?;
        }
        if let Some(ct) = &self.content_type {
            write!(f, "content_type: {ct}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}
