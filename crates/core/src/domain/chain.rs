use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::{ApproverRole, DocumentRef, Identity};
use crate::domain::item::{ItemId, ItemKind};
use crate::domain::status::ItemStatus;
use crate::errors::WorkflowError;

/// Where a step's approver department comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DepartmentSource {
    /// The department the item was submitted from.
    Originating,
    Fixed { name: String },
    /// Chosen by an earlier approver (finance or supply chain assignment).
    Assigned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotYetReached,
    PendingActive,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub level: u32,
    pub role: ApproverRole,
    pub department_source: DepartmentSource,
    pub department: Option<String>,
    pub approver: Option<Identity>,
    pub status: StepStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub signed_document: Option<DocumentRef>,
    #[serde(default)]
    pub auto_approved: bool,
}

impl ApprovalStep {
    pub fn placeholder(
        level: u32,
        role: ApproverRole,
        department_source: DepartmentSource,
        department: Option<String>,
        approver: Option<Identity>,
    ) -> Self {
        Self {
            level,
            role,
            department_source,
            department,
            approver,
            status: StepStatus::NotYetReached,
            acted_at: None,
            comments: None,
            signed_document: None,
            auto_approved: false,
        }
    }

    pub fn action_date(&self) -> Option<NaiveDate> {
        self.acted_at.map(|at| at.date_naive())
    }

    pub fn action_time(&self) -> Option<NaiveTime> {
        self.acted_at.map(|at| at.time())
    }
}

/// Ordered approval steps for one item, plus the kind policy that governs
/// how decisions on them are validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub rule_id: Option<String>,
    pub originating_department: String,
    pub assigned_department: Option<String>,
    pub requires_document_signing: bool,
    pub comments_required_on_approval: bool,
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalChain {
    pub fn unbuilt(item_id: ItemId, kind: ItemKind, originating_department: String) -> Self {
        Self {
            item_id,
            kind,
            rule_id: None,
            originating_department,
            assigned_department: None,
            requires_document_signing: false,
            comments_required_on_approval: false,
            steps: Vec::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn total_levels(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    pub fn approved_levels(&self) -> u32 {
        let approved = self.steps.iter().filter(|step| step.status == StepStatus::Approved).count();
        u32::try_from(approved).unwrap_or(u32::MAX)
    }

    pub fn step(&self, level: u32) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.level == level)
    }

    pub fn active_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.status == StepStatus::PendingActive)
    }

    pub fn current_level(&self) -> Option<u32> {
        self.active_step().map(|step| step.level)
    }

    pub fn rejected_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.status == StepStatus::Rejected)
    }

    pub fn is_fully_approved(&self) -> bool {
        self.is_built() && self.steps.iter().all(|step| step.status == StepStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        self.rejected_step().is_some() || self.is_fully_approved()
    }

    pub fn status(&self) -> ItemStatus {
        if self.rejected_step().is_some() {
            return self.kind.rejected_status();
        }
        if self.is_fully_approved() {
            return self.kind.approved_status();
        }
        match self.active_step() {
            Some(step) => self.kind.pending_status(step.role),
            None => ItemStatus::Draft,
        }
    }

    /// Checks the structural rules every built chain must satisfy. Used when
    /// chains come back from storage.
    pub fn validate_invariants(&self) -> Result<(), WorkflowError> {
        let violation = |message: String| Err(WorkflowError::InvariantViolation(message));

        for (index, step) in self.steps.iter().enumerate() {
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if step.level != expected {
                return violation(format!(
                    "step at position {expected} has level {}; levels must be contiguous from 1",
                    step.level
                ));
            }
            if step.status.is_terminal() != step.acted_at.is_some() {
                return violation(format!(
                    "step {} must carry an action timestamp exactly when it is decided",
                    step.level
                ));
            }
            if step.status == StepStatus::PendingActive && step.approver.is_none() {
                return violation(format!("active step {} has no resolved approver", step.level));
            }
        }

        let active = self.steps.iter().filter(|step| step.status == StepStatus::PendingActive).count();
        if active > 1 {
            return violation(format!("{active} steps are awaiting action; at most one may be"));
        }

        // Steps must read as: approved*, then (pending_active | rejected)?, then not_yet_reached*.
        let mut seen_open = false;
        for step in &self.steps {
            match step.status {
                StepStatus::Approved if seen_open => {
                    return violation(format!(
                        "step {} is approved after an undecided or rejected step",
                        step.level
                    ));
                }
                StepStatus::Approved => {}
                StepStatus::PendingActive | StepStatus::Rejected if seen_open => {
                    return violation(format!(
                        "step {} is {:?} after an undecided or rejected step",
                        step.level, step.status
                    ));
                }
                StepStatus::PendingActive | StepStatus::Rejected | StepStatus::NotYetReached => {
                    seen_open = true;
                }
            }
        }

        if self.is_built() && !self.is_terminal() && self.active_step().is_none() {
            return violation("chain is open but no step is awaiting action".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ApprovalChain, ApprovalStep, DepartmentSource, StepStatus};
    use crate::domain::identity::{ApproverRole, Identity};
    use crate::domain::item::{ItemId, ItemKind};
    use crate::domain::status::ItemStatus;
    use crate::errors::WorkflowError;

    fn step(level: u32, role: ApproverRole, status: StepStatus) -> ApprovalStep {
        let mut step = ApprovalStep::placeholder(
            level,
            role,
            DepartmentSource::Originating,
            Some("Operations".to_string()),
            Some(Identity::new("Sam", "sam@example.com", role.as_str(), "Operations")),
        );
        step.status = status;
        if status.is_terminal() {
            step.acted_at = Some(Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap());
        }
        step
    }

    fn chain(steps: Vec<ApprovalStep>) -> ApprovalChain {
        let mut chain = ApprovalChain::unbuilt(
            ItemId("IT-1".to_string()),
            ItemKind::ItRequest,
            "Operations".to_string(),
        );
        chain.steps = steps;
        chain
    }

    #[test]
    fn unbuilt_chain_reports_draft() {
        let chain = chain(Vec::new());
        assert_eq!(chain.status(), ItemStatus::Draft);
        assert_eq!(chain.current_level(), None);
        assert!(!chain.is_terminal());
    }

    #[test]
    fn status_follows_active_step_role() {
        let chain = chain(vec![
            step(1, ApproverRole::Supervisor, StepStatus::Approved),
            step(2, ApproverRole::ItDepartment, StepStatus::PendingActive),
        ]);
        assert_eq!(chain.status(), ItemStatus::PendingItDepartment);
        assert_eq!(chain.current_level(), Some(2));
        assert!(chain.validate_invariants().is_ok());
    }

    #[test]
    fn action_date_and_time_split_the_timestamp() {
        let decided = step(1, ApproverRole::Supervisor, StepStatus::Approved);
        assert_eq!(decided.action_date().map(|d| d.to_string()).as_deref(), Some("2026-03-04"));
        assert_eq!(decided.action_time().map(|t| t.to_string()).as_deref(), Some("09:30:00"));
    }

    #[test]
    fn two_active_steps_violate_invariants() {
        let chain = chain(vec![
            step(1, ApproverRole::Supervisor, StepStatus::PendingActive),
            step(2, ApproverRole::ItDepartment, StepStatus::PendingActive),
        ]);
        assert!(matches!(chain.validate_invariants(), Err(WorkflowError::InvariantViolation(_))));
    }

    #[test]
    fn approval_after_rejection_violates_invariants() {
        let chain = chain(vec![
            step(1, ApproverRole::Supervisor, StepStatus::Rejected),
            step(2, ApproverRole::ItDepartment, StepStatus::Approved),
        ]);
        assert!(chain.validate_invariants().is_err());
    }

    #[test]
    fn gapped_levels_violate_invariants() {
        let chain = chain(vec![
            step(1, ApproverRole::Supervisor, StepStatus::PendingActive),
            step(3, ApproverRole::ItDepartment, StepStatus::NotYetReached),
        ]);
        assert!(chain.validate_invariants().is_err());
    }
}
