use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chain::{ApprovalChain, DepartmentSource, StepStatus};
use crate::domain::identity::DocumentRef;
use crate::domain::status::ItemStatus;
use crate::errors::WorkflowError;
use crate::routing::{normalize_key, ApproverResolver, RoutingError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInput {
    pub decision: Decision,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub signed_document: Option<DocumentRef>,
    /// Department chosen by this approver for the next assigned-department step.
    #[serde(default)]
    pub assign_department: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl DecisionInput {
    pub fn approve(decided_at: DateTime<Utc>) -> Self {
        Self {
            decision: Decision::Approve,
            comments: None,
            signed_document: None,
            assign_department: None,
            decided_at,
        }
    }

    pub fn reject(comments: impl Into<String>, decided_at: DateTime<Utc>) -> Self {
        Self {
            decision: Decision::Reject,
            comments: Some(comments.into()),
            signed_document: None,
            assign_department: None,
            decided_at,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_signed_document(mut self, document: DocumentRef) -> Self {
        self.signed_document = Some(document);
        self
    }

    pub fn with_assigned_department(mut self, department: impl Into<String>) -> Self {
        self.assign_department = Some(department.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub chain: ApprovalChain,
    pub status: ItemStatus,
    pub decided_level: u32,
    pub next_level: Option<u32>,
}

/// Applies one decision to the active step of `chain`.
///
/// Works on a copy: on any error the caller's chain is exactly as it was.
/// Checks run in this order: closed item, stale level, comments, signed
/// document, next-approver resolution.
pub fn apply_decision<R>(
    chain: &ApprovalChain,
    level: u32,
    input: &DecisionInput,
    resolver: &R,
) -> Result<DecisionOutcome, WorkflowError>
where
    R: ApproverResolver + ?Sized,
{
    if !chain.is_built() {
        return Err(WorkflowError::Validation("approval chain has not been built".to_string()));
    }
    if chain.is_terminal() {
        return Err(WorkflowError::ItemTerminal { status: chain.status() });
    }

    let Some(current) = chain.current_level() else {
        return Err(WorkflowError::InvariantViolation(
            "open chain has no step awaiting action".to_string(),
        ));
    };
    if level != current {
        return Err(WorkflowError::StaleDecision { current, received: level });
    }

    let comments = input
        .comments
        .as_deref()
        .map(str::trim)
        .filter(|comments| !comments.is_empty())
        .map(str::to_string);

    let mut next = chain.clone();
    let index = next
        .steps
        .iter()
        .position(|step| step.level == current)
        .ok_or_else(|| WorkflowError::InvariantViolation(format!("level {current} is missing")))?;

    match input.decision {
        Decision::Reject => {
            let Some(comments) = comments else {
                return Err(WorkflowError::Validation(
                    "comments are required when rejecting".to_string(),
                ));
            };

            let step = &mut next.steps[index];
            step.status = StepStatus::Rejected;
            step.acted_at = Some(input.decided_at);
            step.comments = Some(comments);

            let status = next.status();
            Ok(DecisionOutcome { chain: next, status, decided_level: current, next_level: None })
        }
        Decision::Approve => {
            if chain.comments_required_on_approval && comments.is_none() {
                return Err(WorkflowError::Validation(format!(
                    "comments are required when approving a {}",
                    chain.kind
                )));
            }

            // Only chains that require signing keep a document on their steps.
            let signed_document = if chain.requires_document_signing {
                match input.signed_document.clone().filter(|document| !document.is_blank()) {
                    Some(document) => Some(document),
                    None => return Err(WorkflowError::MissingDocument { level: current }),
                }
            } else {
                None
            };

            if let Some(department) = input.assign_department.as_deref().map(str::trim) {
                assign_department(&mut next, department)?;
            }

            let step = &mut next.steps[index];
            step.status = StepStatus::Approved;
            step.acted_at = Some(input.decided_at);
            step.comments = comments;
            step.signed_document = signed_document;

            let next_level = match next.steps.get(index + 1).map(|step| step.level) {
                Some(level) => {
                    activate(&mut next, index + 1, resolver)?;
                    Some(level)
                }
                None => None,
            };

            let status = next.status();
            Ok(DecisionOutcome { chain: next, status, decided_level: current, next_level })
        }
    }
}

fn assign_department(chain: &mut ApprovalChain, department: &str) -> Result<(), WorkflowError> {
    if department.is_empty() {
        return Err(WorkflowError::Validation("assigned department must not be blank".to_string()));
    }

    match &chain.assigned_department {
        Some(existing) if normalize_key(existing) != normalize_key(department) => {
            Err(WorkflowError::Validation(format!(
                "department `{existing}` is already assigned; it cannot be changed to `{department}`"
            )))
        }
        Some(_) => Ok(()),
        None => {
            chain.assigned_department = Some(department.to_string());
            Ok(())
        }
    }
}

fn activate<R>(chain: &mut ApprovalChain, index: usize, resolver: &R) -> Result<(), WorkflowError>
where
    R: ApproverResolver + ?Sized,
{
    let assigned = chain.assigned_department.clone();
    let step = &mut chain.steps[index];

    if step.approver.is_none() {
        let department = match step.department_source {
            DepartmentSource::Assigned => assigned,
            _ => step.department.clone(),
        }
        .ok_or(RoutingError::MissingAssignment { level: step.level, role: step.role })?;

        let approver = resolver.resolve_approver(step.role, &department).ok_or_else(|| {
            RoutingError::UnresolvedApprover { role: step.role, department: department.clone() }
        })?;
        step.department = Some(department);
        step.approver = Some(approver);
    }

    step.status = StepStatus::PendingActive;
    Ok(())
}
