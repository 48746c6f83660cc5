use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use chainflow_core::audit::{AuditOutcome, InMemoryAuditSink};
use chainflow_core::chain::DecisionInput;
use chainflow_core::domain::identity::{ApproverRole, DocumentRef, Identity};
use chainflow_core::domain::item::{ApprovableItem, ApprovableItemDraft, ItemId, ItemKind};
use chainflow_core::domain::status::ItemStatus;
use chainflow_core::errors::{ApplicationError, InterfaceError, WorkflowError};
use chainflow_core::routing::{DirectoryEntry, InMemoryDirectory, RoutingConfig};
use chainflow_db::{
    connect_with_settings, migrations, ApprovalService, DecisionRequest,
    InMemoryItemRepository, InMemoryNotificationDispatcher, ItemRepository, Notification,
    RepositoryError, SqlItemRepository,
};

struct Harness {
    service: ApprovalService,
    audit: InMemoryAuditSink,
    notifier: InMemoryNotificationDispatcher,
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new(vec![
        DirectoryEntry::new("Kim", "kim@example.com", ApproverRole::Supervisor, "Operations"),
        DirectoryEntry::new("Fay", "fay@example.com", ApproverRole::FinanceOfficer, "Finance"),
        DirectoryEntry::new("Dee", "dee@example.com", ApproverRole::DepartmentHead, "Marketing"),
        DirectoryEntry::new("Sam", "sam@example.com", ApproverRole::SupplyChain, "Supply Chain"),
        DirectoryEntry::new("Hal", "hal@example.com", ApproverRole::HeadOfBusiness, "Executive"),
        DirectoryEntry::new("Ola", "ola@example.com", ApproverRole::ItDepartment, "IT"),
    ])
}

fn harness_with(repository: Arc<dyn ItemRepository>) -> Harness {
    let audit = InMemoryAuditSink::default();
    let notifier = InMemoryNotificationDispatcher::default();
    let service = ApprovalService::new(
        repository,
        Arc::new(directory()),
        RoutingConfig::standard(),
        Arc::new(audit.clone()),
        Arc::new(notifier.clone()),
    );
    Harness { service, audit, notifier }
}

fn harness() -> Harness {
    harness_with(Arc::new(InMemoryItemRepository::default()))
}

fn requester() -> Identity {
    Identity::new("Ana", "ana@example.com", "staff", "Operations")
}

fn draft(id: &str, kind: ItemKind, amount: Option<i64>) -> ApprovableItemDraft {
    ApprovableItemDraft {
        id: ItemId(id.to_string()),
        kind,
        amount: amount.map(|value| Decimal::new(value, 0)),
        department: "Operations".to_string(),
        requested_by: requester(),
        description: "quarterly travel".to_string(),
        assigned_department: None,
    }
}

fn decision(item: &str, actor: &str, level: u32, input: DecisionInput) -> DecisionRequest {
    DecisionRequest {
        item_id: ItemId(item.to_string()),
        actor_email: actor.to_string(),
        level,
        expected_version: None,
        input,
    }
}

fn at(hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn cash_request_is_approved_by_the_supervisor_and_disbursed() {
    let h = harness();
    let item = h
        .service
        .submit(draft("CR-1", ItemKind::CashRequest, Some(300)), "req-1")
        .await
        .expect("submit");
    assert_eq!(item.status, ItemStatus::PendingSupervisor);
    assert_eq!(item.current_level(), Some(1));

    let approved = h
        .service
        .decide(decision("CR-1", "Kim@Example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await
        .expect("approve");
    assert_eq!(approved.status, ItemStatus::Approved);
    assert_eq!(approved.version, 1);

    let finalized =
        h.service.finalize(&approved.id, "fay@example.com", "req-3").await.expect("finalize");
    assert_eq!(finalized.status, ItemStatus::Disbursed);
    assert_eq!(finalized.version, 2);

    let types: Vec<String> = h.audit.events().into_iter().map(|event| event.event_type).collect();
    assert_eq!(types, vec!["chain.built", "decision.applied", "item.finalized"]);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(matches!(&sent[0], Notification::ApproverAssigned { level: 1, .. }));
    assert!(matches!(
        &sent[1],
        Notification::ItemApproved { status: ItemStatus::Approved, recipient, .. }
            if recipient.email == "ana@example.com"
    ));
}

#[tokio::test]
async fn employee_invoice_routes_to_the_department_finance_assigns() {
    let h = harness();
    let item = h
        .service
        .submit(draft("EI-1", ItemKind::EmployeeInvoice, Some(80)), "req-1")
        .await
        .expect("submit");
    assert_eq!(item.status, ItemStatus::PendingFinanceAssignment);

    let without_assignment = h
        .service
        .decide(decision("EI-1", "fay@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await;
    assert!(matches!(
        without_assignment,
        Err(ApplicationError::Workflow(WorkflowError::Routing(_)))
    ));

    let input = DecisionInput::approve(at(10)).with_assigned_department("Marketing");
    let assigned = h
        .service
        .decide(decision("EI-1", "fay@example.com", 1, input), "req-3")
        .await
        .expect("approve with assignment");
    assert_eq!(assigned.status, ItemStatus::PendingDepartmentHead);
    assert_eq!(assigned.chain.assigned_department.as_deref(), Some("Marketing"));

    let inbox = h.service.inbox("dee@example.com").await.expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, ItemId("EI-1".to_string()));
}

#[tokio::test]
async fn only_the_current_approver_may_decide() {
    let h = harness();
    h.service.submit(draft("IT-1", ItemKind::ItRequest, None), "req-1").await.expect("submit");

    let result = h
        .service
        .decide(decision("IT-1", "ola@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await;

    let error = result.expect_err("it department acts at level 2 only");
    assert!(matches!(error, ApplicationError::Unauthorized { .. }));
    let interface = error.into_interface("req-2");
    assert!(matches!(interface, InterfaceError::Forbidden { .. }));
    assert_eq!(interface.correlation_id(), "req-2");

    let refused = h.audit.events();
    assert_eq!(refused.last().map(|event| event.event_type.as_str()), Some("decision.rejected"));
    assert_eq!(refused.last().map(|event| event.outcome.clone()), Some(AuditOutcome::Rejected));
}

#[tokio::test]
async fn stale_level_and_stale_version_are_both_refused() {
    let h = harness();
    h.service.submit(draft("IT-1", ItemKind::ItRequest, None), "req-1").await.expect("submit");
    h.service
        .decide(decision("IT-1", "kim@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await
        .expect("supervisor approves");

    let stale_level = h
        .service
        .decide(decision("IT-1", "ola@example.com", 1, DecisionInput::approve(at(10))), "req-3")
        .await;
    assert!(matches!(
        stale_level,
        Err(ApplicationError::Workflow(WorkflowError::StaleDecision { current: 2, received: 1 }))
    ));

    let mut request = decision("IT-1", "ola@example.com", 2, DecisionInput::approve(at(10)));
    request.expected_version = Some(0);
    let stale_version = h.service.decide(request, "req-4").await;
    assert!(matches!(
        stale_version,
        Err(ApplicationError::Conflict { expected_version: 0, .. })
    ));

    let mut request = decision("IT-1", "ola@example.com", 2, DecisionInput::approve(at(11)));
    request.expected_version = Some(1);
    let done = h.service.decide(request, "req-5").await.expect("it approves");
    assert_eq!(done.status, ItemStatus::Approved);
}

#[tokio::test]
async fn rejection_closes_the_item_and_tells_the_requester() {
    let h = harness();
    h.service.submit(draft("CR-2", ItemKind::CashRequest, Some(50)), "req-1").await.expect("submit");

    let missing_comment = h
        .service
        .decide(decision("CR-2", "kim@example.com", 1, DecisionInput::reject("  ", at(9))), "req-2")
        .await;
    assert!(matches!(missing_comment, Err(ApplicationError::Workflow(WorkflowError::Validation(_)))));

    let rejected = h
        .service
        .decide(
            decision("CR-2", "kim@example.com", 1, DecisionInput::reject("no budget", at(9))),
            "req-3",
        )
        .await
        .expect("reject");
    assert_eq!(rejected.status, ItemStatus::Denied);

    let again = h
        .service
        .decide(decision("CR-2", "kim@example.com", 1, DecisionInput::approve(at(10))), "req-4")
        .await;
    assert!(matches!(
        again,
        Err(ApplicationError::Workflow(WorkflowError::ItemTerminal { status: ItemStatus::Denied }))
    ));

    let finalize = h.service.finalize(&rejected.id, "fay@example.com", "req-5").await;
    assert!(matches!(finalize, Err(ApplicationError::Workflow(WorkflowError::Validation(_)))));

    let sent = h.notifier.sent().await;
    assert!(matches!(
        sent.last(),
        Some(Notification::ItemRejected { level: 1, comments: Some(comments), .. })
            if comments == "no budget"
    ));
}

#[tokio::test]
async fn supplier_invoice_needs_a_signed_document_at_every_manual_level() {
    let h = harness();
    let mut supplier = draft("SUP-1", ItemKind::SupplierInvoice, Some(12_500));
    supplier.department = "Supply Chain".to_string();
    supplier.assigned_department = Some("Marketing".to_string());
    let item = h.service.submit(supplier, "req-1").await.expect("submit");
    assert_eq!(item.current_level(), Some(2));

    let unsigned = h
        .service
        .decide(decision("SUP-1", "dee@example.com", 2, DecisionInput::approve(at(9))), "req-2")
        .await;
    assert!(matches!(
        unsigned,
        Err(ApplicationError::Workflow(WorkflowError::MissingDocument { level: 2 }))
    ));
    let unchanged = h.service.get(&item.id).await.expect("reload");
    assert_eq!(unchanged, item);

    let signers = [(2, "dee@example.com"), (3, "hal@example.com"), (4, "fay@example.com")];
    for (offset, (level, actor)) in signers.into_iter().enumerate() {
        let input = DecisionInput::approve(at(10) + Duration::hours(offset as i64))
            .with_signed_document(DocumentRef(format!("docs/sup-1-level-{level}.pdf")));
        h.service
            .decide(decision("SUP-1", actor, level, input), "req-3")
            .await
            .expect("signed approval");
    }

    let progress = h.service.progress(&item.id).await.expect("progress");
    assert_eq!(progress.percent_complete, 100);
    assert_eq!(progress.status, ItemStatus::Approved);
    assert_eq!(progress.history.len(), 4);
    assert!(progress.history[0].auto_approved);

    let processed = h.service.finalize(&item.id, "fay@example.com", "req-4").await.expect("finalize");
    assert_eq!(processed.status, ItemStatus::Processed);
}

#[tokio::test]
async fn submit_reports_duplicates_and_routing_gaps() {
    let h = harness();
    h.service.submit(draft("CR-3", ItemKind::CashRequest, Some(10)), "req-1").await.expect("submit");

    let duplicate = h.service.submit(draft("CR-3", ItemKind::CashRequest, Some(10)), "req-2").await;
    assert!(matches!(duplicate, Err(ApplicationError::Workflow(WorkflowError::Validation(_)))));

    let mut elsewhere = draft("CR-4", ItemKind::CashRequest, Some(10));
    elsewhere.department = "Legal".to_string();
    let unresolved = h.service.submit(elsewhere, "req-3").await;
    assert!(matches!(unresolved, Err(ApplicationError::Workflow(WorkflowError::Routing(_)))));

    let missing = h.service.get(&ItemId("CR-4".to_string())).await;
    assert!(matches!(missing, Err(ApplicationError::NotFound(id)) if id == "CR-4"));
}

#[tokio::test]
async fn justification_completes_on_approval_with_comments() {
    let h = harness();
    h.service.submit(draft("JU-1", ItemKind::Justification, None), "req-1").await.expect("submit");

    let bare = h
        .service
        .decide(decision("JU-1", "kim@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await;
    assert!(matches!(bare, Err(ApplicationError::Workflow(WorkflowError::Validation(_)))));

    for (level, actor) in [(1, "kim@example.com"), (2, "fay@example.com")] {
        let input = DecisionInput::approve(at(10)).with_comments("matches the travel policy");
        h.service.decide(decision("JU-1", actor, level, input), "req-3").await.expect("approve");
    }

    let done = h.service.get(&ItemId("JU-1".to_string())).await.expect("reload");
    assert_eq!(done.status, ItemStatus::Completed);

    let finalize = h.service.finalize(&done.id, "fay@example.com", "req-4").await;
    assert!(matches!(
        finalize,
        Err(ApplicationError::Workflow(WorkflowError::ItemTerminal { .. }))
    ));
}

#[tokio::test]
async fn sql_backed_service_persists_decisions() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let h = harness_with(Arc::new(SqlItemRepository::new(pool)));

    h.service.submit(draft("IT-9", ItemKind::ItRequest, None), "req-1").await.expect("submit");
    h.service
        .decide(decision("IT-9", "kim@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await
        .expect("approve");

    let inbox = h.service.inbox("OLA@example.com").await.expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].status, ItemStatus::PendingItDepartment);
    assert_eq!(inbox[0].version, 1);
}

#[tokio::test]
async fn finalized_item_reports_its_fulfilment_status() {
    let h = harness();
    h.service.submit(draft("CR-9", ItemKind::CashRequest, Some(120)), "req-1").await.expect("submit");
    h.service
        .decide(decision("CR-9", "kim@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await
        .expect("approve");
    h.service.finalize(&ItemId("CR-9".to_string()), "fay@example.com", "req-3").await.expect("finalize");

    let again = h
        .service
        .decide(decision("CR-9", "kim@example.com", 1, DecisionInput::approve(at(10))), "req-4")
        .await;
    assert!(matches!(
        again,
        Err(ApplicationError::Workflow(WorkflowError::ItemTerminal {
            status: ItemStatus::Disbursed
        }))
    ));

    let progress = h.service.progress(&ItemId("CR-9".to_string())).await.expect("progress");
    assert_eq!(progress.status, ItemStatus::Disbursed);
    assert_eq!(progress.percent_complete, 100);
    assert_eq!(progress.history.len(), 1);
}

/// Lets another writer land between the service's load and its save.
struct RacingRepository {
    inner: InMemoryItemRepository,
}

#[async_trait]
impl ItemRepository for RacingRepository {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ApprovableItem>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, item: ApprovableItem) -> Result<ApprovableItem, RepositoryError> {
        self.inner.insert(item).await
    }

    async fn save_if_version(
        &self,
        item: ApprovableItem,
        expected_version: u64,
    ) -> Result<ApprovableItem, RepositoryError> {
        if let Some(stored) = self.inner.find_by_id(&item.id).await? {
            self.inner.save_if_version(stored, expected_version).await?;
        }
        self.inner.save_if_version(item, expected_version).await
    }

    async fn list_pending_for(&self, email: &str) -> Result<Vec<ApprovableItem>, RepositoryError> {
        self.inner.list_pending_for(email).await
    }
}

#[tokio::test]
async fn decision_that_loses_a_save_race_is_audited_as_refused() {
    let h = harness_with(Arc::new(RacingRepository { inner: InMemoryItemRepository::default() }));
    h.service.submit(draft("CR-8", ItemKind::CashRequest, Some(80)), "req-1").await.expect("submit");

    let lost = h
        .service
        .decide(decision("CR-8", "kim@example.com", 1, DecisionInput::approve(at(9))), "req-2")
        .await;
    assert!(matches!(lost, Err(ApplicationError::Conflict { expected_version: 0, .. })));

    let events = h.audit.events();
    let last = events.last().expect("audit event");
    assert_eq!(last.event_type, "decision.rejected");
    assert_eq!(last.outcome, AuditOutcome::Rejected);
    assert!(events.iter().all(|event| event.event_type != "decision.applied"));
    assert_eq!(h.notifier.sent().await.len(), 1);
}
