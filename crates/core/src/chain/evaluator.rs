use serde::{Deserialize, Serialize};

use crate::domain::chain::ApprovalChain;
use crate::domain::identity::ApproverRole;
use crate::domain::status::ItemStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Authorization {
    Authorized { level: u32, role: ApproverRole },
    /// Someone else holds the active step.
    NotCurrentApprover { level: u32, role: ApproverRole },
    /// The chain is unbuilt or its active step has no resolved approver.
    NoActiveStep,
    ChainTerminal { status: ItemStatus },
}

impl Authorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Authorized { level, role } => {
                format!("authorized as `{role}` for level {level}")
            }
            Self::NotCurrentApprover { level, role } => {
                format!("level {level} is waiting on a different `{role}` approver")
            }
            Self::NoActiveStep => "no step is currently awaiting action".to_string(),
            Self::ChainTerminal { status } => format!("item is closed with status `{status}`"),
        }
    }
}

/// Single entry point for "is it this user's turn". Email comparison is
/// case-insensitive.
pub fn can_act(chain: &ApprovalChain, acting_email: &str) -> Authorization {
    if chain.is_terminal() {
        return Authorization::ChainTerminal { status: chain.status() };
    }

    let Some(step) = chain.active_step() else {
        return Authorization::NoActiveStep;
    };
    let Some(approver) = &step.approver else {
        return Authorization::NoActiveStep;
    };

    if approver.matches_email(acting_email) {
        Authorization::Authorized { level: step.level, role: step.role }
    } else {
        Authorization::NotCurrentApprover { level: step.level, role: step.role }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{can_act, Authorization};
    use crate::domain::chain::{ApprovalChain, ApprovalStep, DepartmentSource, StepStatus};
    use crate::domain::identity::{ApproverRole, Identity};
    use crate::domain::item::{ItemId, ItemKind};
    use crate::domain::status::ItemStatus;

    fn chain(first: StepStatus) -> ApprovalChain {
        let mut chain = ApprovalChain::unbuilt(
            ItemId("CR-9".to_string()),
            ItemKind::CashRequest,
            "Operations".to_string(),
        );
        let mut step = ApprovalStep::placeholder(
            1,
            ApproverRole::Supervisor,
            DepartmentSource::Originating,
            Some("Operations".to_string()),
            Some(Identity::new("Kim", "User@Example.com", "supervisor", "Operations")),
        );
        step.status = first;
        if first.is_terminal() {
            step.acted_at = Some(Utc::now());
        }
        chain.steps.push(step);
        chain
    }

    #[test]
    fn matching_is_case_insensitive() {
        let chain = chain(StepStatus::PendingActive);

        let upper = can_act(&chain, "User@Example.com");
        let lower = can_act(&chain, "user@example.com");

        assert_eq!(upper, lower);
        assert_eq!(upper, Authorization::Authorized { level: 1, role: ApproverRole::Supervisor });
    }

    #[test]
    fn other_users_are_not_the_current_approver() {
        let result = can_act(&chain(StepStatus::PendingActive), "someone@example.com");
        assert_eq!(
            result,
            Authorization::NotCurrentApprover { level: 1, role: ApproverRole::Supervisor }
        );
        assert!(!result.is_authorized());
    }

    #[test]
    fn unbuilt_chain_has_no_active_step() {
        let chain = ApprovalChain::unbuilt(
            ItemId("CR-10".to_string()),
            ItemKind::CashRequest,
            "Operations".to_string(),
        );
        assert_eq!(can_act(&chain, "user@example.com"), Authorization::NoActiveStep);
    }

    #[test]
    fn terminal_chain_reports_its_status() {
        let result = can_act(&chain(StepStatus::Rejected), "user@example.com");
        assert_eq!(result, Authorization::ChainTerminal { status: ItemStatus::Denied });
        assert!(result.reason().contains("denied"));
    }

    #[test]
    fn repeated_calls_are_stable() {
        let chain = chain(StepStatus::PendingActive);
        let first = can_act(&chain, "someone@example.com");
        for _ in 0..3 {
            assert_eq!(can_act(&chain, "someone@example.com"), first);
        }
    }
}
