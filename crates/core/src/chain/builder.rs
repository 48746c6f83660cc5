use chrono::{DateTime, Utc};

use crate::domain::chain::{ApprovalChain, ApprovalStep, DepartmentSource, StepStatus};
use crate::domain::item::ApprovableItemDraft;
use crate::errors::WorkflowError;
use crate::routing::{ApproverResolver, KindPolicy, RoutingConfig, RoutingError, StepTemplate};

const AUTO_APPROVAL_NOTE: &str = "approved on assignment";

pub struct ChainBuilder<'a, R: ?Sized> {
    config: &'a RoutingConfig,
    resolver: &'a R,
}

impl<'a, R> ChainBuilder<'a, R>
where
    R: ApproverResolver + ?Sized,
{
    pub fn new(config: &'a RoutingConfig, resolver: &'a R) -> Self {
        Self { config, resolver }
    }

    /// Builds the chain for `draft`. The first step that is not auto-approved
    /// becomes the active step; every later step stays a placeholder.
    pub fn build(
        &self,
        draft: &ApprovableItemDraft,
        at: DateTime<Utc>,
    ) -> Result<ApprovalChain, WorkflowError> {
        let policy = self.config.policy_for(draft.kind);
        validate_amount(draft, &policy)?;

        let rule = self.config.match_rule(draft).ok_or_else(|| RoutingError::NoMatchingRule {
            kind: draft.kind,
            department: draft.department.clone(),
            amount: draft.amount,
        })?;
        if rule.steps.is_empty() {
            return Err(RoutingError::InvalidRule {
                rule_id: rule.id.clone(),
                reason: "at least one step is required".to_string(),
            }
            .into());
        }

        let assigned_department = draft
            .assigned_department
            .as_deref()
            .map(str::trim)
            .filter(|department| !department.is_empty())
            .map(str::to_string);

        let mut steps = Vec::with_capacity(rule.steps.len());
        for (index, template) in rule.steps.iter().enumerate() {
            let level = u32::try_from(index + 1).unwrap_or(u32::MAX);
            steps.push(self.materialize(level, template, draft, assigned_department.as_deref())?);
        }

        let mut auto_prefix = 0;
        for (step, template) in steps.iter_mut().zip(&rule.steps) {
            if !template.auto_approve {
                break;
            }
            step.status = StepStatus::Approved;
            step.acted_at = Some(at);
            step.comments = Some(AUTO_APPROVAL_NOTE.to_string());
            step.auto_approved = true;
            auto_prefix += 1;
        }

        if let Some(first) = steps.get_mut(auto_prefix) {
            if first.approver.is_none() {
                return Err(match &first.department {
                    Some(department) => RoutingError::UnresolvedApprover {
                        role: first.role,
                        department: department.clone(),
                    },
                    None => RoutingError::MissingAssignment { level: first.level, role: first.role },
                }
                .into());
            }
            first.status = StepStatus::PendingActive;
        }

        Ok(ApprovalChain {
            item_id: draft.id.clone(),
            kind: draft.kind,
            rule_id: Some(rule.id.clone()),
            originating_department: draft.department.clone(),
            assigned_department,
            requires_document_signing: policy.requires_document_signing,
            comments_required_on_approval: policy.comments_required_on_approval,
            steps,
        })
    }

    fn materialize(
        &self,
        level: u32,
        template: &StepTemplate,
        draft: &ApprovableItemDraft,
        assigned_department: Option<&str>,
    ) -> Result<ApprovalStep, WorkflowError> {
        let department = match &template.department {
            DepartmentSource::Originating => Some(draft.department.clone()),
            DepartmentSource::Fixed { name } => Some(name.clone()),
            DepartmentSource::Assigned => assigned_department.map(str::to_string),
        };

        // Known departments are snapshotted now; assigned ones wait until the
        // step is activated.
        let approver = match &department {
            Some(department) => Some(
                self.resolver.resolve_approver(template.role, department).ok_or_else(|| {
                    RoutingError::UnresolvedApprover {
                        role: template.role,
                        department: department.clone(),
                    }
                })?,
            ),
            None => None,
        };

        Ok(ApprovalStep::placeholder(
            level,
            template.role,
            template.department.clone(),
            department,
            approver,
        ))
    }
}

pub fn build_chain<R>(
    draft: &ApprovableItemDraft,
    config: &RoutingConfig,
    resolver: &R,
    at: DateTime<Utc>,
) -> Result<ApprovalChain, WorkflowError>
where
    R: ApproverResolver + ?Sized,
{
    ChainBuilder::new(config, resolver).build(draft, at)
}

fn validate_amount(draft: &ApprovableItemDraft, policy: &KindPolicy) -> Result<(), WorkflowError> {
    match draft.amount {
        Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
            Err(WorkflowError::InvalidAmount {
                kind: draft.kind,
                amount: Some(amount),
                reason: "amount must not be negative".to_string(),
            })
        }
        None if policy.amount_required => Err(WorkflowError::InvalidAmount {
            kind: draft.kind,
            amount: None,
            reason: "an amount is required".to_string(),
        }),
        _ => Ok(()),
    }
}
