//! Copydesk Workflow Engine
//!
//! The Copydesk engine is the backend for a content-writing marketplace: clients submit content orders, an
//! admin assigns approved writers, writers deliver work, and payment is reconciled from a hosted checkout
//! provider. This library contains the core logic for the order lifecycle. It is transport-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never
//!    need to access the database directly. Instead, use the public API provided by the engine. The
//!    exception is the data types used in the database. These are defined in the `db_types` module and are
//!    public.
//! 2. The engine public API ([`mod@api`]). This provides the public-facing functionality of the engine:
//!    order flow, role-scoped queries, authentication state and writer applications. Backends implement the
//!    traits in [`mod@traits`] in order to drive the Copydesk server.
//! 3. The order state machine ([`mod@order_fsm`]) and access policy ([`mod@policy`]). Every status change
//!    and every order-scoped action is checked against these two tables, so illegal transitions and
//!    unauthorised calls are rejected in exactly one place each.
//!
//! The engine also emits events when certain actions occur (order created, order paid, stage advanced,
//! message posted). A simple actor framework lets you hook into these events and perform custom actions.

pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod messaging;
pub mod order_fsm;
pub mod policy;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    accounts_api::AccountApi,
    auth_api::AuthApi,
    errors::{AccountApiError, AuthApiError, WriterApiError},
    order_flow_api::OrderFlowApi,
    order_objects,
    writer_api::WriterApi,
};
pub use traits::{AuthManagement, OrderManagement, WorkflowError, WorkflowManagement, WriterManagement};
