use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use chainflow_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use chainflow_core::chain::{
    apply_decision, build_chain, can_act, Authorization, Decision, DecisionInput,
    ProgressSummary,
};
use chainflow_core::domain::item::{ApprovableItem, ApprovableItemDraft, ItemId};
use chainflow_core::errors::{ApplicationError, WorkflowError};
use chainflow_core::routing::{ApproverResolver, RoutingConfig};

use crate::notification::{Notification, NotificationDispatcher};
use crate::repositories::{ItemRepository, RepositoryError};

/// One decision as received from a caller holding a snapshot of the item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub item_id: ItemId,
    pub actor_email: String,
    /// Level the caller saw as active when it rendered the item.
    pub level: u32,
    /// Version of that snapshot, when the caller tracks it.
    #[serde(default)]
    pub expected_version: Option<u64>,
    pub input: DecisionInput,
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::VersionConflict { item_id, expected_version } => {
                ApplicationError::Conflict { item_id, expected_version }
            }
            RepositoryError::AlreadyExists(item_id) => ApplicationError::Workflow(
                WorkflowError::Validation(format!("item `{item_id}` already exists")),
            ),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Host-side orchestration around the pure chain engine: loads and stores
/// items, checks who may act, records audit events and sends notifications.
pub struct ApprovalService {
    repository: Arc<dyn ItemRepository>,
    resolver: Arc<dyn ApproverResolver + Send + Sync>,
    routing: RoutingConfig,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl ApprovalService {
    pub fn new(
        repository: Arc<dyn ItemRepository>,
        resolver: Arc<dyn ApproverResolver + Send + Sync>,
        routing: RoutingConfig,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { repository, resolver, routing, audit, notifier }
    }

    pub async fn submit(
        &self,
        draft: ApprovableItemDraft,
        correlation_id: &str,
    ) -> Result<ApprovableItem, ApplicationError> {
        let at = Utc::now();
        let context = AuditContext::new(
            Some(draft.id.clone()),
            correlation_id,
            draft.requested_by.email.clone(),
        );

        let chain = match build_chain(&draft, &self.routing, self.resolver.as_ref(), at) {
            Ok(chain) => chain,
            Err(error) => {
                warn!(
                    event_name = "approval.chain.build_failed",
                    correlation_id,
                    item_id = %draft.id,
                    kind = %draft.kind,
                    error = %error,
                    "approval chain could not be built"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "chain.built",
                        AuditCategory::Submission,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(error.into());
            }
        };

        let item = self.repository.insert(ApprovableItem::from_draft(draft, chain, at)).await?;

        self.audit.emit(
            AuditEvent::new(
                &context,
                "chain.built",
                AuditCategory::Submission,
                AuditOutcome::Success,
            )
            .with_metadata("kind", item.kind.as_str())
            .with_metadata("rule_id", item.chain.rule_id.clone().unwrap_or_default())
            .with_metadata("total_levels", item.chain.total_levels().to_string())
            .with_metadata("status", item.status.as_str()),
        );
        info!(
            event_name = "approval.item.submitted",
            correlation_id,
            item_id = %item.id,
            kind = %item.kind,
            status = %item.status,
            total_levels = item.chain.total_levels(),
            "item submitted for approval"
        );

        self.notify_active_approver(&item, correlation_id).await;
        Ok(item)
    }

    pub async fn decide(
        &self,
        request: DecisionRequest,
        correlation_id: &str,
    ) -> Result<ApprovableItem, ApplicationError> {
        let mut item = self.load(&request.item_id).await?;
        let context =
            AuditContext::new(Some(item.id.clone()), correlation_id, request.actor_email.clone());

        if let Some(expected_version) = request.expected_version {
            if expected_version != item.version {
                let error = ApplicationError::Conflict {
                    item_id: item.id.0.clone(),
                    expected_version,
                };
                return Err(self.refuse(&context, &request, error));
            }
        }

        let authorization = can_act(&item.chain, &request.actor_email);
        if item.status.is_terminal() || matches!(authorization, Authorization::ChainTerminal { .. })
        {
            let error = WorkflowError::ItemTerminal { status: item.status }.into();
            return Err(self.refuse(&context, &request, error));
        }
        if let Some(current) = item.current_level() {
            if current != request.level {
                let error =
                    WorkflowError::StaleDecision { current, received: request.level }.into();
                return Err(self.refuse(&context, &request, error));
            }
        }
        if !authorization.is_authorized() {
            let error = ApplicationError::Unauthorized {
                item_id: item.id.0.clone(),
                actor: request.actor_email.clone(),
                reason: authorization.reason(),
            };
            return Err(self.refuse(&context, &request, error));
        }

        let outcome = match apply_decision(
            &item.chain,
            request.level,
            &request.input,
            self.resolver.as_ref(),
        ) {
            Ok(outcome) => outcome,
            Err(error) => return Err(self.refuse(&context, &request, error.into())),
        };

        let loaded_version = item.version;
        let decided_level = outcome.decided_level;
        item.apply_outcome(outcome, request.input.decided_at);
        let item = match self.repository.save_if_version(item, loaded_version).await {
            Ok(item) => item,
            Err(error) => return Err(self.refuse(&context, &request, error.into())),
        };

        self.audit.emit(
            AuditEvent::new(
                &context,
                "decision.applied",
                AuditCategory::Decision,
                AuditOutcome::Success,
            )
            .with_metadata("level", decided_level.to_string())
            .with_metadata("decision", decision_label(request.input.decision))
            .with_metadata("status", item.status.as_str())
            .with_metadata("version", item.version.to_string()),
        );
        info!(
            event_name = "approval.decision.applied",
            correlation_id,
            item_id = %item.id,
            level = decided_level,
            decision = decision_label(request.input.decision),
            status = %item.status,
            "decision applied"
        );

        self.notify_after_decision(&item, decided_level, correlation_id).await;
        Ok(item)
    }

    /// Moves a fully approved item into its fulfilment status.
    pub async fn finalize(
        &self,
        item_id: &ItemId,
        actor: &str,
        correlation_id: &str,
    ) -> Result<ApprovableItem, ApplicationError> {
        let mut item = self.load(item_id).await?;
        let context = AuditContext::new(Some(item.id.clone()), correlation_id, actor);
        let loaded_version = item.version;

        if let Err(error) = item.finalize(Utc::now()) {
            self.audit.emit(
                AuditEvent::new(
                    &context,
                    "item.finalized",
                    AuditCategory::Fulfilment,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            );
            return Err(error.into());
        }
        let item = self.repository.save_if_version(item, loaded_version).await?;

        self.audit.emit(
            AuditEvent::new(
                &context,
                "item.finalized",
                AuditCategory::Fulfilment,
                AuditOutcome::Success,
            )
            .with_metadata("status", item.status.as_str()),
        );
        info!(
            event_name = "approval.item.finalized",
            correlation_id,
            item_id = %item.id,
            status = %item.status,
            "item finalized"
        );
        Ok(item)
    }

    pub async fn get(&self, item_id: &ItemId) -> Result<ApprovableItem, ApplicationError> {
        self.load(item_id).await
    }

    pub async fn progress(&self, item_id: &ItemId) -> Result<ProgressSummary, ApplicationError> {
        Ok(self.load(item_id).await?.progress())
    }

    /// Items currently waiting on `email`.
    pub async fn inbox(&self, email: &str) -> Result<Vec<ApprovableItem>, ApplicationError> {
        Ok(self.repository.list_pending_for(email).await?)
    }

    async fn load(&self, item_id: &ItemId) -> Result<ApprovableItem, ApplicationError> {
        self.repository
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(item_id.0.clone()))
    }

    fn refuse(
        &self,
        context: &AuditContext,
        request: &DecisionRequest,
        error: ApplicationError,
    ) -> ApplicationError {
        warn!(
            event_name = "approval.decision.refused",
            correlation_id = %context.correlation_id,
            item_id = %request.item_id,
            actor = %request.actor_email,
            level = request.level,
            error = %error,
            "decision refused"
        );
        self.audit.emit(
            AuditEvent::new(
                context,
                "decision.rejected",
                AuditCategory::Decision,
                AuditOutcome::Rejected,
            )
            .with_metadata("level", request.level.to_string())
            .with_metadata("decision", decision_label(request.input.decision))
            .with_metadata("error", error.to_string()),
        );
        error
    }

    async fn notify_after_decision(&self, item: &ApprovableItem, level: u32, correlation_id: &str) {
        if item.chain.is_fully_approved() {
            self.dispatch(
                Notification::ItemApproved {
                    item_id: item.id.clone(),
                    kind: item.kind,
                    status: item.status,
                    recipient: item.requested_by.clone(),
                },
                correlation_id,
            )
            .await;
        } else if item.status == item.kind.rejected_status() {
            let comments = item.chain.step(level).and_then(|step| step.comments.clone());
            self.dispatch(
                Notification::ItemRejected {
                    item_id: item.id.clone(),
                    kind: item.kind,
                    level,
                    comments,
                    recipient: item.requested_by.clone(),
                },
                correlation_id,
            )
            .await;
        } else {
            self.notify_active_approver(item, correlation_id).await;
        }
    }

    async fn notify_active_approver(&self, item: &ApprovableItem, correlation_id: &str) {
        let Some(step) = item.chain.active_step() else {
            return;
        };
        let Some(approver) = step.approver.clone() else {
            return;
        };
        self.dispatch(
            Notification::ApproverAssigned {
                item_id: item.id.clone(),
                kind: item.kind,
                level: step.level,
                role: step.role,
                recipient: approver,
            },
            correlation_id,
        )
        .await;
    }

    // Delivery failures never undo a stored decision.
    async fn dispatch(&self, notification: Notification, correlation_id: &str) {
        let event_name = notification.event_name();
        let recipient = notification.recipient().email.clone();
        if let Err(error) = self.notifier.dispatch(notification).await {
            warn!(
                event_name = "approval.notification.failed",
                correlation_id,
                notification = event_name,
                recipient = %recipient,
                error = %error,
                "notification could not be delivered"
            );
        }
    }
}

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::Approve => "approve",
        Decision::Reject => "reject",
    }
}
