//! The access policy engine.
//!
//! Authorization for the whole system lives in one pure function, [`authorize`]. Every mutating call and
//! every order-scoped read passes through it before touching storage. Keeping the rules in one table means
//! there is a single function to test, and new stages or roles cannot silently diverge across services.
//!
//! Deny reasons are internal. The HTTP layer maps a denial to a generic 403 without leaking why.

use std::fmt::Display;

use thiserror::Error;

use crate::db_types::{Order, OrderStatusType, Role, Roles};

/// The caller, as established by the authentication layer. Anonymous callers have neither a user id nor a
/// verified email and hold no roles.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub roles: Roles,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new<S: Into<String>>(user_id: S, email: S, roles: Roles) -> Self {
        Self { user_id: Some(user_id.into()), email: Some(email.into()), roles }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(Role::Admin)
    }

    fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Does this actor own the order as its client? Either the order was linked to their account, or it
    /// still carries their verified email from anonymous creation.
    fn owns_as_client(&self, order: &Order) -> bool {
        match (&order.client_id, &self.user_id) {
            (Some(cid), Some(uid)) if cid == uid => return true,
            _ => {},
        }
        matches!(&self.email, Some(email) if email.eq_ignore_ascii_case(&order.client_email))
    }

    fn is_assigned_writer(&self, order: &Order) -> bool {
        match (&order.writer_id, &self.user_id) {
            (Some(wid), Some(uid)) => wid == uid,
            _ => false,
        }
    }
}

/// Every operation the engine exposes. The policy table is keyed on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateOrder,
    ViewOrder,
    ListOwnOrders,
    SearchOrders,
    AssignWriter,
    SubmitWork,
    RequestRevision,
    ApproveOrder,
    CancelOrder,
    PostMessage,
    AttachFile,
    CreateCheckout,
    LinkOrders,
    ApplyAsWriter,
    ListApplications,
    DecideApplication,
    UpdateRoles,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Action {action} denied: {reason}")]
pub struct PolicyError {
    pub action: Action,
    pub reason: String,
}

fn deny<S: Into<String>>(action: Action, reason: S) -> Result<(), PolicyError> {
    Err(PolicyError { action, reason: reason.into() })
}

/// Decides whether `actor` may perform `action`, optionally against `order`.
///
/// The rules:
/// * Admins may do anything.
/// * Anyone, including anonymous callers, may create an order.
/// * Authenticated users may apply as writers, link their own orders, and list their own orders.
/// * Clients may view, message, upload to and pay for orders they own.
/// * The assigned writer may view, message and upload to their order, and submit work while the order is
///   in `writing`.
/// * Everything else (assignment, review decisions, cancellation, search, application decisions, role
///   updates) is admin-only.
pub fn authorize(actor: &Actor, action: Action, order: Option<&Order>) -> Result<(), PolicyError> {
    use Action::*;
    if actor.is_admin() {
        return Ok(());
    }
    match action {
        CreateOrder => Ok(()),
        ApplyAsWriter | LinkOrders | ListOwnOrders => {
            if actor.is_authenticated() {
                Ok(())
            } else {
                deny(action, "authentication required")
            }
        },
        ViewOrder | PostMessage | AttachFile => {
            let order = order_for(action, order)?;
            if actor.owns_as_client(order) || actor.is_assigned_writer(order) {
                Ok(())
            } else {
                deny(action, format!("user is neither the client nor the writer of order {}", order.order_id))
            }
        },
        CreateCheckout => {
            let order = order_for(action, order)?;
            if actor.owns_as_client(order) {
                Ok(())
            } else {
                deny(action, format!("only the client may pay for order {}", order.order_id))
            }
        },
        SubmitWork => {
            let order = order_for(action, order)?;
            if !actor.is_assigned_writer(order) {
                return deny(action, format!("user is not the assigned writer of order {}", order.order_id));
            }
            if order.status != OrderStatusType::Writing {
                return deny(action, format!("order {} is {}, not writing", order.order_id, order.status));
            }
            Ok(())
        },
        SearchOrders | AssignWriter | RequestRevision | ApproveOrder | CancelOrder | ListApplications
        | DecideApplication | UpdateRoles => deny(action, "admin role required"),
    }
}

fn order_for(action: Action, order: Option<&Order>) -> Result<&Order, PolicyError> {
    order.ok_or_else(|| PolicyError { action, reason: "no order in scope".into() })
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use cpd_common::UsdCents;

    use super::*;
    use crate::db_types::{ContentType, DeadlineTier, OrderId, Role};

    fn order(client_id: Option<&str>, writer_id: Option<&str>, status: OrderStatusType) -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            order_id: OrderId("ord-000000000001".into()),
            order_number: 1001,
            client_email: "alice@example.com".into(),
            client_id: client_id.map(String::from),
            content_type: ContentType::BlogPost,
            word_count: 1000,
            title: "Ten ways to test policy tables".into(),
            description: "Exhaustively.".into(),
            keywords: None,
            expertise: None,
            deadline: DeadlineTier::SevenDays,
            due_at: now,
            client_price: UsdCents::from(15_600),
            writer_id: writer_id.map(String::from),
            writer_price: writer_id.map(|_| UsdCents::from(8_000)),
            writer_deadline: writer_id.map(|_| now),
            created_at: now,
            updated_at: now,
            status,
        }
    }

    fn client() -> Actor {
        Actor::new("user-alice", "alice@example.com", Roles(vec![Role::Client]))
    }

    fn writer(id: &str) -> Actor {
        Actor { user_id: Some(id.into()), email: Some(format!("{id}@example.com")), roles: Roles(vec![Role::Writer]) }
    }

    fn admin() -> Actor {
        Actor::new("user-root", "root@example.com", Roles(vec![Role::Admin]))
    }

    #[test]
    fn admin_may_do_anything() {
        let o = order(None, None, OrderStatusType::PendingPayment);
        for action in [
            Action::CreateOrder,
            Action::ViewOrder,
            Action::SearchOrders,
            Action::AssignWriter,
            Action::SubmitWork,
            Action::RequestRevision,
            Action::ApproveOrder,
            Action::CancelOrder,
            Action::DecideApplication,
            Action::UpdateRoles,
        ] {
            assert!(authorize(&admin(), action, Some(&o)).is_ok(), "admin denied {action}");
        }
    }

    #[test]
    fn anonymous_may_only_create_orders() {
        let anon = Actor::anonymous();
        assert!(authorize(&anon, Action::CreateOrder, None).is_ok());
        assert!(authorize(&anon, Action::ApplyAsWriter, None).is_err());
        assert!(authorize(&anon, Action::ListOwnOrders, None).is_err());
        let o = order(None, None, OrderStatusType::PendingPayment);
        assert!(authorize(&anon, Action::ViewOrder, Some(&o)).is_err());
    }

    #[test]
    fn client_sees_only_their_own_orders() {
        let own_linked = order(Some("user-alice"), None, OrderStatusType::PendingPayment);
        let own_by_email = order(None, None, OrderStatusType::PendingPayment);
        let foreign = {
            let mut o = order(Some("user-bob"), None, OrderStatusType::PendingPayment);
            o.client_email = "bob@example.com".into();
            o
        };
        let c = client();
        assert!(authorize(&c, Action::ViewOrder, Some(&own_linked)).is_ok());
        assert!(authorize(&c, Action::ViewOrder, Some(&own_by_email)).is_ok());
        assert!(authorize(&c, Action::PostMessage, Some(&own_linked)).is_ok());
        assert!(authorize(&c, Action::CreateCheckout, Some(&own_by_email)).is_ok());
        assert!(authorize(&c, Action::ViewOrder, Some(&foreign)).is_err());
        assert!(authorize(&c, Action::CreateCheckout, Some(&foreign)).is_err());
    }

    #[test]
    fn client_may_not_run_the_desk() {
        let o = order(Some("user-alice"), None, OrderStatusType::InReview);
        let c = client();
        for action in
            [Action::AssignWriter, Action::RequestRevision, Action::ApproveOrder, Action::CancelOrder, Action::SearchOrders]
        {
            assert!(authorize(&c, action, Some(&o)).is_err(), "client allowed {action}");
        }
    }

    #[test]
    fn writer_submission_rules() {
        let o = order(Some("user-alice"), Some("writer-w1"), OrderStatusType::Writing);
        assert!(authorize(&writer("writer-w1"), Action::SubmitWork, Some(&o)).is_ok());
        // Wrong writer.
        assert!(authorize(&writer("writer-w2"), Action::SubmitWork, Some(&o)).is_err());
        // Right writer, wrong stage.
        let reviewed = order(Some("user-alice"), Some("writer-w1"), OrderStatusType::InReview);
        assert!(authorize(&writer("writer-w1"), Action::SubmitWork, Some(&reviewed)).is_err());
        // Writers may view and message their orders, but not pay for them.
        assert!(authorize(&writer("writer-w1"), Action::ViewOrder, Some(&o)).is_ok());
        assert!(authorize(&writer("writer-w1"), Action::PostMessage, Some(&o)).is_ok());
        assert!(authorize(&writer("writer-w1"), Action::CreateCheckout, Some(&o)).is_err());
    }

    #[test]
    fn email_match_ignores_case() {
        let mut o = order(None, None, OrderStatusType::PendingPayment);
        o.client_email = "Alice@Example.COM".into();
        assert!(authorize(&client(), Action::ViewOrder, Some(&o)).is_ok());
    }
}
