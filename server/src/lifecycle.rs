use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    None,
    RiderAssign,
    PickedUp,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RiderAssign => "rider_assign",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::RiderAssign => 1,
            Self::PickedUp => 2,
            Self::InTransit => 3,
            Self::Delivered => 4,
        }
    }

    // every transition must move strictly forward in the ordering, so
    // Delivered is terminal and repeated updates are rejected
    pub fn advance(self, to: DeliveryStatus) -> Result<DeliveryStatus, TransitionError> {
        if to.rank() > self.rank() {
            Ok(to)
        } else {
            Err(TransitionError::DeliveryOrder { from: self, to })
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn record_payment(self) -> Result<PaymentStatus, TransitionError> {
        match self {
            Self::Unpaid => Ok(Self::Paid),
            Self::Paid => Err(TransitionError::AlreadyPaid),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    #[default]
    Pending,
    Assigned,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    #[default]
    Pending,
    Accepted,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Free,
    Busy,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Rider,
    Admin,
}

/// The two sources allowed to change a user's role. Both funnel through
/// [`apply_role_trigger`] so the `prev_role` invariant holds no matter
/// which one fires first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleTrigger {
    AdminToggle,
    RiderPromotion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleChange {
    pub role: UserRole,
    pub prev_role: Option<UserRole>,
}

// prev_role is set iff the new role is admin; the toggle is its own
// inverse, so applying it twice restores the starting role
pub fn apply_role_trigger(
    trigger: RoleTrigger,
    role: UserRole,
    prev_role: Option<UserRole>,
) -> RoleChange {
    match (trigger, role) {
        (RoleTrigger::AdminToggle, UserRole::Admin) => RoleChange {
            role: prev_role.unwrap_or_default(),
            prev_role: None,
        },
        (RoleTrigger::AdminToggle, role) => RoleChange {
            role: UserRole::Admin,
            prev_role: Some(role),
        },
        // promoting a current admin keeps them admin and records rider as
        // the role to demote back into
        (RoleTrigger::RiderPromotion, UserRole::Admin) => RoleChange {
            role: UserRole::Admin,
            prev_role: Some(UserRole::Rider),
        },
        (RoleTrigger::RiderPromotion, _) => RoleChange {
            role: UserRole::Rider,
            prev_role: None,
        },
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransitionError {
    #[error("delivery status cannot move from {from} to {to}")]
    DeliveryOrder {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("parcel is already paid")]
    AlreadyPaid,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_delivery_moves_forward() {
        let status = DeliveryStatus::None;

        let status = status.advance(DeliveryStatus::RiderAssign).unwrap();
        let status = status.advance(DeliveryStatus::PickedUp).unwrap();
        let status = status.advance(DeliveryStatus::InTransit).unwrap();
        let status = status.advance(DeliveryStatus::Delivered).unwrap();

        assert_eq!(status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_delivery_can_skip_forward() {
        let status = DeliveryStatus::PickedUp
            .advance(DeliveryStatus::Delivered)
            .unwrap();

        assert_eq!(status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_delivery_cannot_regress() {
        let err = DeliveryStatus::InTransit
            .advance(DeliveryStatus::RiderAssign)
            .unwrap_err();

        assert_matches!(
            err,
            TransitionError::DeliveryOrder {
                from: DeliveryStatus::InTransit,
                to: DeliveryStatus::RiderAssign,
            }
        );
    }

    #[test]
    fn test_delivered_is_terminal() {
        for to in [
            DeliveryStatus::None,
            DeliveryStatus::RiderAssign,
            DeliveryStatus::PickedUp,
            DeliveryStatus::InTransit,
            DeliveryStatus::Delivered,
        ] {
            let err = DeliveryStatus::Delivered.advance(to).unwrap_err();
            assert_matches!(err, TransitionError::DeliveryOrder { .. });
        }
    }

    #[test]
    fn test_payment_is_recorded_once() {
        let status = PaymentStatus::Unpaid.record_payment().unwrap();
        assert_eq!(status, PaymentStatus::Paid);

        let err = status.record_payment().unwrap_err();
        assert_matches!(err, TransitionError::AlreadyPaid);
    }

    #[test]
    fn test_admin_toggle_is_self_inverse() {
        let promoted = apply_role_trigger(RoleTrigger::AdminToggle, UserRole::User, None);
        assert_eq!(promoted.role, UserRole::Admin);
        assert_eq!(promoted.prev_role, Some(UserRole::User));

        let demoted =
            apply_role_trigger(RoleTrigger::AdminToggle, promoted.role, promoted.prev_role);
        assert_eq!(demoted.role, UserRole::User);
        assert_eq!(demoted.prev_role, None);
    }

    #[test]
    fn test_admin_toggle_remembers_rider() {
        let promoted = apply_role_trigger(RoleTrigger::AdminToggle, UserRole::Rider, None);
        assert_eq!(promoted.role, UserRole::Admin);
        assert_eq!(promoted.prev_role, Some(UserRole::Rider));

        let demoted =
            apply_role_trigger(RoleTrigger::AdminToggle, promoted.role, promoted.prev_role);
        assert_eq!(demoted.role, UserRole::Rider);
        assert_eq!(demoted.prev_role, None);
    }

    #[test]
    fn test_admin_toggle_without_prev_role_falls_back_to_user() {
        let demoted = apply_role_trigger(RoleTrigger::AdminToggle, UserRole::Admin, None);
        assert_eq!(demoted.role, UserRole::User);
        assert_eq!(demoted.prev_role, None);
    }

    #[test]
    fn test_rider_promotion() {
        let change = apply_role_trigger(RoleTrigger::RiderPromotion, UserRole::User, None);
        assert_eq!(change.role, UserRole::Rider);
        assert_eq!(change.prev_role, None);
    }

    #[test]
    fn test_rider_promotion_of_admin_merges() {
        let change = apply_role_trigger(
            RoleTrigger::RiderPromotion,
            UserRole::Admin,
            Some(UserRole::User),
        );
        assert_eq!(change.role, UserRole::Admin);
        assert_eq!(change.prev_role, Some(UserRole::Rider));

        let demoted = apply_role_trigger(RoleTrigger::AdminToggle, change.role, change.prev_role);
        assert_eq!(demoted.role, UserRole::Rider);
    }
}
