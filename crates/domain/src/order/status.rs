//! Order status state machine.

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// Pending ──► Shipped ──► Delivered
///    │           │
///    └───────────┴──► Cancelled (restocks line items)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed, stock debited, awaiting dispatch.
    #[default]
    Pending,

    /// Handed to the courier.
    Shipped,

    /// Received by the customer (terminal state).
    Delivered,

    /// Cancelled and restocked (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Shipped)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Fails with `InvalidTransition` unless the order can be cancelled.
    pub fn ensure_cancellable(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.can_cancel() {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                order_id,
                current: *self,
                requested: OrderStatus::Cancelled,
            })
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Shipped => 1,
            OrderStatus::Delivered => 2,
            OrderStatus::Cancelled => 3,
        }
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

/// Which admin status changes are accepted.
///
/// Both policies refuse to move an order out of `Cancelled`, since its
/// stock has already been returned. A move to `Cancelled` is only allowed
/// where [`OrderStatus::can_cancel`] holds and must be carried out by the
/// cancellation workflow so the line items are restocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any of Pending, Shipped and Delivered may be set from any other.
    #[default]
    Permissive,

    /// Forward-only: Pending, then Shipped, then Delivered.
    Strict,
}

impl StatusPolicy {
    /// Checks whether an admin may move an order from `current` to `requested`.
    pub fn check(
        &self,
        order_id: OrderId,
        current: OrderStatus,
        requested: OrderStatus,
    ) -> Result<(), DomainError> {
        let allowed = if current == requested {
            true
        } else if requested == OrderStatus::Cancelled {
            current.can_cancel()
        } else if current == OrderStatus::Cancelled {
            false
        } else {
            match self {
                StatusPolicy::Permissive => true,
                StatusPolicy::Strict => requested.rank() > current.rank(),
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                order_id,
                current,
                requested,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPolicy::Permissive => "permissive",
            StatusPolicy::Strict => "strict",
        }
    }
}

impl std::str::FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(StatusPolicy::Permissive),
            "strict" => Ok(StatusPolicy::Strict),
            other => Err(format!("unknown status policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: OrderId = OrderId::new(1);

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_can_cancel_from_pending_and_shipped_only() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_ensure_cancellable_reports_current_status() {
        let err = OrderStatus::Cancelled.ensure_cancellable(ORDER).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                order_id: ORDER,
                current: OrderStatus::Cancelled,
                requested: OrderStatus::Cancelled,
            }
        );
        assert!(OrderStatus::Shipped.ensure_cancellable(ORDER).is_ok());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!(" delivered ".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!(matches!(
            "Lost".parse::<OrderStatus>(),
            Err(DomainError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_permissive_policy_allows_backward_moves() {
        let policy = StatusPolicy::Permissive;
        assert!(policy.check(ORDER, OrderStatus::Delivered, OrderStatus::Pending).is_ok());
        assert!(policy.check(ORDER, OrderStatus::Pending, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn test_no_policy_reopens_cancelled_orders() {
        for policy in [StatusPolicy::Permissive, StatusPolicy::Strict] {
            assert!(policy.check(ORDER, OrderStatus::Cancelled, OrderStatus::Pending).is_err());
            assert!(policy.check(ORDER, OrderStatus::Cancelled, OrderStatus::Cancelled).is_ok());
            assert!(policy.check(ORDER, OrderStatus::Delivered, OrderStatus::Cancelled).is_err());
        }
    }

    #[test]
    fn test_strict_policy_is_forward_only() {
        let policy = StatusPolicy::Strict;
        assert!(policy.check(ORDER, OrderStatus::Pending, OrderStatus::Shipped).is_ok());
        assert!(policy.check(ORDER, OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
        assert!(policy.check(ORDER, OrderStatus::Delivered, OrderStatus::Shipped).is_err());
        assert!(policy.check(ORDER, OrderStatus::Shipped, OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("STRICT".parse::<StatusPolicy>().unwrap(), StatusPolicy::Strict);
        assert!("lenient".parse::<StatusPolicy>().is_err());
    }
}
