//! The order state machine.
//!
//! Every status change in the engine funnels through this table. The storage layer enforces it again with
//! a compare-and-swap on the current status, so a transition that is legal here can still lose a race and
//! come back as stale.
//!
//! | From \ To       | InProgress | Writing | InReview | Revision | Completed | Cancelled |
//! |-----------------|------------|---------|----------|----------|-----------|-----------|
//! | PendingPayment  | ✓ (paid)   |         |          |          |           | ✓         |
//! | InProgress      |            | ✓       |          |          |           | ✓         |
//! | Writing         |            |         | ✓        |          |           |           |
//! | InReview        |            |         |          | ✓        | ✓         |           |
//! | Revision        |            | ✓       |          |          |           |           |
//! | Completed       |            |         |          |          |           |           |
//! | Cancelled       |            |         |          |          |           |           |
//!
//! `InReview → Revision → Writing` is the only back-edge; everything else moves forward. `Completed` and
//! `Cancelled` are terminal.

use crate::db_types::OrderStatusType;
use crate::db_types::OrderStatusType::*;

/// The full set of legal `(from, to)` status transitions.
pub const TRANSITIONS: &[(OrderStatusType, OrderStatusType)] = &[
    (PendingPayment, InProgress),
    (PendingPayment, Cancelled),
    (InProgress, Writing),
    (InProgress, Cancelled),
    (Writing, InReview),
    (InReview, Revision),
    (InReview, Completed),
    (Revision, Writing),
];

/// Is `from → to` a legal transition?
pub fn is_allowed(from: OrderStatusType, to: OrderStatusType) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Terminal statuses never move again.
pub fn is_terminal(status: OrderStatusType) -> bool {
    matches!(status, Completed | Cancelled)
}

/// The transitions that may be taken out of `from`.
pub fn successors(from: OrderStatusType) -> Vec<OrderStatusType> {
    TRANSITIONS.iter().filter(|(f, _)| *f == from).map(|(_, t)| *t).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: [OrderStatusType; 7] =
        [PendingPayment, InProgress, Writing, InReview, Revision, Completed, Cancelled];

    #[test]
    fn terminal_statuses_have_no_exits() {
        for s in ALL {
            if is_terminal(s) {
                assert!(successors(s).is_empty(), "{s} is terminal but has successors");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for s in ALL {
            assert!(!is_allowed(s, s), "{s} must not transition to itself");
        }
    }

    #[test]
    fn revision_cycle_is_the_only_back_edge() {
        // Forward order of the happy path.
        let rank = |s: OrderStatusType| match s {
            PendingPayment => 0,
            InProgress => 1,
            Writing => 2,
            InReview => 3,
            Revision => 4,
            Completed => 5,
            Cancelled => 5,
        };
        for (from, to) in TRANSITIONS {
            if (*from, *to) == (Revision, Writing) {
                continue;
            }
            assert!(rank(*to) > rank(*from), "unexpected back-edge {from} -> {to}");
        }
        assert!(is_allowed(InReview, Revision));
        assert!(is_allowed(Revision, Writing));
    }

    #[test]
    fn happy_path() {
        assert!(is_allowed(PendingPayment, InProgress));
        assert!(is_allowed(InProgress, Writing));
        assert!(is_allowed(Writing, InReview));
        assert!(is_allowed(InReview, Completed));
    }

    #[test]
    fn illegal_jumps_rejected() {
        assert!(!is_allowed(PendingPayment, Writing));
        assert!(!is_allowed(Writing, Completed));
        assert!(!is_allowed(Completed, Writing));
        assert!(!is_allowed(Cancelled, PendingPayment));
        assert!(!is_allowed(Writing, Cancelled));
    }
}
