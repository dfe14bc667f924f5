use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_error::AppError;

/// Delivery statuses in their canonical forward order. Index position in
/// [`OrderDeliveryStatus::ALL`] is what forward/backward transition checks
/// compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDeliveryStatus {
    OrderPlaced,
    Accepted,
    Processing,
    Packaging,
    PartialDelivery,
    WaitingForDeliverer,
    OnTheWay,
    PartialReturned,
    Returned,
    Canceled,
    Completed,
}

impl OrderDeliveryStatus {
    pub const ALL: [OrderDeliveryStatus; 11] = [
        OrderDeliveryStatus::OrderPlaced,
        OrderDeliveryStatus::Accepted,
        OrderDeliveryStatus::Processing,
        OrderDeliveryStatus::Packaging,
        OrderDeliveryStatus::PartialDelivery,
        OrderDeliveryStatus::WaitingForDeliverer,
        OrderDeliveryStatus::OnTheWay,
        OrderDeliveryStatus::PartialReturned,
        OrderDeliveryStatus::Returned,
        OrderDeliveryStatus::Canceled,
        OrderDeliveryStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDeliveryStatus::OrderPlaced => "ORDER_PLACED",
            OrderDeliveryStatus::Accepted => "ACCEPTED",
            OrderDeliveryStatus::Processing => "PROCESSING",
            OrderDeliveryStatus::Packaging => "PACKAGING",
            OrderDeliveryStatus::PartialDelivery => "PARTIAL_DELIVERY",
            OrderDeliveryStatus::WaitingForDeliverer => "WAITING_FOR_DELIVERER",
            OrderDeliveryStatus::OnTheWay => "ON_THE_WAY",
            OrderDeliveryStatus::PartialReturned => "PARTIAL_RETURNED",
            OrderDeliveryStatus::Returned => "RETURNED",
            OrderDeliveryStatus::Canceled => "CANCELED",
            OrderDeliveryStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                AppError::field_validation(
                    "delivery_status_name",
                    format!("{value} is not a valid delivery status"),
                )
            })
    }

    /// Position in the canonical forward order.
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|status| status == self)
            .expect("status is a member of ALL")
    }

    /// Stage every row of an order ends up with once `target` becomes the
    /// current status: rows before it are COMPLETED, rows after it PENDING.
    pub fn stage_after_transition(&self, target: OrderDeliveryStatus) -> OrderStage {
        if *self == target {
            OrderStage::Current
        } else if self.index() < target.index() {
            OrderStage::Completed
        } else {
            OrderStage::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStage {
    Pending,
    Current,
    Completed,
}

impl OrderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::Pending => "PENDING",
            OrderStage::Current => "CURRENT",
            OrderStage::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationRole {
    Owner,
    Admin,
    Staff,
    Customer,
}

impl OrganizationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationRole::Owner => "OWNER",
            OrganizationRole::Admin => "ADMIN",
            OrganizationRole::Staff => "STAFF",
            OrganizationRole::Customer => "CUSTOMER",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "OWNER" => Ok(OrganizationRole::Owner),
            "ADMIN" => Ok(OrganizationRole::Admin),
            "STAFF" => Ok(OrganizationRole::Staff),
            "CUSTOMER" => Ok(OrganizationRole::Customer),
            other => Err(AppError::Consistency(format!(
                "{other} is not a known organization role"
            ))),
        }
    }

    /// Admins and owners may move an order's status in both directions and
    /// edit the payable amount; everyone else is forward-only.
    pub fn is_admin_or_owner(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Admin)
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, OrganizationRole::Customer)
    }
}

/// Audit verbs this service emits. Creation of orders and transactions,
/// status changes, and removal of ledger rows on a completion reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Addition,
    Change,
    Deletion,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Addition => "ADDITION",
            ActionType::Change => "CHANGE",
            ActionType::Deletion => "DELETION",
        }
    }
}

/// Per-user preference flag values. The column is free-form text; anything
/// other than ON (an admin may store its own off markers) disables
/// delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEnable {
    On,
    Off,
}

impl NotificationEnable {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEnable::On => "ON",
            NotificationEnable::Off => "OFF",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_starts_and_ends_where_the_state_machine_expects() {
        assert_eq!(OrderDeliveryStatus::ALL[0], OrderDeliveryStatus::OrderPlaced);
        assert_eq!(
            OrderDeliveryStatus::ALL[OrderDeliveryStatus::ALL.len() - 1],
            OrderDeliveryStatus::Completed
        );
        assert!(OrderDeliveryStatus::Accepted.index() < OrderDeliveryStatus::OnTheWay.index());
        assert!(OrderDeliveryStatus::Returned.index() < OrderDeliveryStatus::Canceled.index());
    }

    #[test]
    fn parse_round_trips_every_status() {
        for status in OrderDeliveryStatus::ALL {
            assert_eq!(OrderDeliveryStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderDeliveryStatus::parse("SHIPPED").is_err());
    }

    #[test]
    fn transition_restages_earlier_rows_completed_and_later_rows_pending() {
        let target = OrderDeliveryStatus::OnTheWay;
        assert_eq!(
            OrderDeliveryStatus::OrderPlaced.stage_after_transition(target),
            OrderStage::Completed
        );
        assert_eq!(
            OrderDeliveryStatus::OnTheWay.stage_after_transition(target),
            OrderStage::Current
        );
        assert_eq!(
            OrderDeliveryStatus::Completed.stage_after_transition(target),
            OrderStage::Pending
        );
    }

    #[test]
    fn exactly_one_current_after_any_transition() {
        for target in OrderDeliveryStatus::ALL {
            let current_count = OrderDeliveryStatus::ALL
                .iter()
                .filter(|status| status.stage_after_transition(target) == OrderStage::Current)
                .count();
            assert_eq!(current_count, 1);
        }
    }

    #[test]
    fn only_admin_and_owner_may_move_backward() {
        assert!(OrganizationRole::Owner.is_admin_or_owner());
        assert!(OrganizationRole::Admin.is_admin_or_owner());
        assert!(!OrganizationRole::Staff.is_admin_or_owner());
        assert!(!OrganizationRole::Customer.is_admin_or_owner());
        assert!(OrganizationRole::Staff.is_staff());
        assert!(!OrganizationRole::Customer.is_staff());
    }
}
