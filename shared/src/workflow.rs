//! Approval workflow state machines for sales reports and deliveries

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DeliveryStatus, ReportStatus};
use crate::validation::required_reason;

/// A workflow rule was violated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("cannot {action} a {from} {entity}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("{0} is required")]
    MissingReason(&'static str),
}

/// Reviewer verdict on a pending report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    fn action(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approve",
            ReviewDecision::Rejected => "reject",
        }
    }
}

/// Body of a review request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewInput {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Resulting status fields of an accepted review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub status: ReportStatus,
    pub rejection_reason: Option<String>,
}

/// `pending -> approved | rejected`. Rejection needs a reason; terminal
/// reports accept nothing.
pub fn review_report(
    current: ReportStatus,
    decision: ReviewDecision,
    rejection_reason: Option<&str>,
) -> Result<ReviewOutcome, WorkflowError> {
    if current.is_terminal() {
        return Err(WorkflowError::InvalidTransition {
            entity: "report",
            from: current.to_string(),
            action: decision.action(),
        });
    }

    let reason = match decision {
        ReviewDecision::Approved => None,
        ReviewDecision::Rejected => Some(
            required_reason(rejection_reason)
                .ok_or(WorkflowError::MissingReason("rejection_reason"))?
                .to_string(),
        ),
    };

    let status = match decision {
        ReviewDecision::Approved => ReportStatus::Approved,
        ReviewDecision::Rejected => ReportStatus::Rejected,
    };
    Ok(ReviewOutcome {
        status,
        rejection_reason: reason,
    })
}

/// A requested change to a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryAction<'a> {
    Edit,
    Delete,
    MarkDelivered,
    Complete,
    Cancel { reason: Option<&'a str> },
}

impl DeliveryAction<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryAction::Edit => "edit",
            DeliveryAction::Delete => "delete",
            DeliveryAction::MarkDelivered => "mark as delivered",
            DeliveryAction::Complete => "complete",
            DeliveryAction::Cancel { .. } => "cancel",
        }
    }
}

/// Status a delivery moves to under `action`.
///
/// ```text
/// in_transit --deliver--> delivered --complete--> completed
///     |                       |
///     +-------cancel----------+--> cancelled
/// ```
///
/// Edit and delete leave the status as is and are only valid in transit.
pub fn advance_delivery(
    current: DeliveryStatus,
    action: DeliveryAction<'_>,
) -> Result<DeliveryStatus, WorkflowError> {
    let refuse = || WorkflowError::InvalidTransition {
        entity: "delivery",
        from: current.to_string(),
        action: action.name(),
    };
    if current.is_terminal() {
        return Err(refuse());
    }
    if let DeliveryAction::Cancel { reason } = action {
        required_reason(reason).ok_or(WorkflowError::MissingReason("reason"))?;
    }

    let next = match action {
        DeliveryAction::Edit | DeliveryAction::Delete if current.is_editable() => Some(current),
        DeliveryAction::MarkDelivered if current == DeliveryStatus::InTransit => {
            Some(DeliveryStatus::Delivered)
        }
        DeliveryAction::Complete if current == DeliveryStatus::Delivered => {
            Some(DeliveryStatus::Completed)
        }
        DeliveryAction::Cancel { .. } => Some(DeliveryStatus::Cancelled),
        _ => None,
    };

    next.ok_or_else(refuse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_report_can_be_approved() {
        let outcome = review_report(ReportStatus::Pending, ReviewDecision::Approved, None).unwrap();
        assert_eq!(outcome.status, ReportStatus::Approved);
        assert_eq!(outcome.rejection_reason, None);
    }

    #[test]
    fn test_rejection_requires_reason() {
        assert_eq!(
            review_report(ReportStatus::Pending, ReviewDecision::Rejected, Some("  ")),
            Err(WorkflowError::MissingReason("rejection_reason"))
        );

        let outcome = review_report(
            ReportStatus::Pending,
            ReviewDecision::Rejected,
            Some("incomplete receipts"),
        )
        .unwrap();
        assert_eq!(outcome.status, ReportStatus::Rejected);
        assert_eq!(outcome.rejection_reason.as_deref(), Some("incomplete receipts"));
    }

    #[test]
    fn test_terminal_reports_reject_every_decision() {
        for current in [ReportStatus::Approved, ReportStatus::Rejected] {
            assert!(matches!(
                review_report(current, ReviewDecision::Approved, None),
                Err(WorkflowError::InvalidTransition { .. })
            ));
            assert!(matches!(
                review_report(current, ReviewDecision::Rejected, Some("late")),
                Err(WorkflowError::InvalidTransition { .. })
            ));
            // a finished report refuses the decision before the reason is looked at
            assert!(matches!(
                review_report(current, ReviewDecision::Rejected, None),
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_delivery_happy_path() {
        let delivered =
            advance_delivery(DeliveryStatus::InTransit, DeliveryAction::MarkDelivered).unwrap();
        assert_eq!(delivered, DeliveryStatus::Delivered);
        let completed = advance_delivery(delivered, DeliveryAction::Complete).unwrap();
        assert_eq!(completed, DeliveryStatus::Completed);
    }

    #[test]
    fn test_cancel_from_in_transit_or_delivered() {
        let cancel = DeliveryAction::Cancel {
            reason: Some("buyer withdrew"),
        };
        for current in [DeliveryStatus::InTransit, DeliveryStatus::Delivered] {
            assert_eq!(advance_delivery(current, cancel), Ok(DeliveryStatus::Cancelled));
        }
        for current in [DeliveryStatus::Completed, DeliveryStatus::Cancelled] {
            assert!(matches!(
                advance_delivery(current, cancel),
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_cancel_requires_reason() {
        assert_eq!(
            advance_delivery(DeliveryStatus::Delivered, DeliveryAction::Cancel { reason: None }),
            Err(WorkflowError::MissingReason("reason"))
        );
        for current in [DeliveryStatus::Completed, DeliveryStatus::Cancelled] {
            assert!(matches!(
                advance_delivery(current, DeliveryAction::Cancel { reason: None }),
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_edit_and_delete_only_in_transit() {
        for action in [DeliveryAction::Edit, DeliveryAction::Delete] {
            assert_eq!(
                advance_delivery(DeliveryStatus::InTransit, action),
                Ok(DeliveryStatus::InTransit)
            );
            for current in [
                DeliveryStatus::Delivered,
                DeliveryStatus::Completed,
                DeliveryStatus::Cancelled,
            ] {
                assert!(advance_delivery(current, action).is_err());
            }
        }
    }

    #[test]
    fn test_no_skipping_or_reversal() {
        assert!(advance_delivery(DeliveryStatus::InTransit, DeliveryAction::Complete).is_err());
        assert!(advance_delivery(DeliveryStatus::Delivered, DeliveryAction::MarkDelivered).is_err());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = advance_delivery(DeliveryStatus::Completed, DeliveryAction::Edit).unwrap_err();
        assert_eq!(err.to_string(), "cannot edit a Completed delivery");
    }
}
