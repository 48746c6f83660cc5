use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::decision::DecisionOutcome;
use crate::chain::progress::{summarize, ProgressSummary};
use crate::domain::chain::ApprovalChain;
use crate::domain::identity::Identity;
use crate::domain::status::ItemStatus;
use crate::errors::WorkflowError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ItemKind {
    CashRequest,
    EmployeeInvoice,
    SupplierInvoice,
    ItRequest,
    Justification,
}

impl ItemKind {
    pub const ALL: [ItemKind; 5] = [
        Self::CashRequest,
        Self::EmployeeInvoice,
        Self::SupplierInvoice,
        Self::ItRequest,
        Self::Justification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashRequest => "cash_request",
            Self::EmployeeInvoice => "employee_invoice",
            Self::SupplierInvoice => "supplier_invoice",
            Self::ItRequest => "it_request",
            Self::Justification => "justification",
        }
    }
}

impl FromStr for ItemKind {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown item kind `{value}`")))
    }
}

impl TryFrom<String> for ItemKind {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item as submitted, before a chain is attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovableItemDraft {
    pub id: ItemId,
    pub kind: ItemKind,
    #[serde(default)]
    pub amount: Option<Decimal>,
    pub department: String,
    pub requested_by: Identity,
    #[serde(default)]
    pub description: String,
    /// Department picked at submission time, e.g. by supply chain when it
    /// forwards a supplier invoice.
    #[serde(default)]
    pub assigned_department: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovableItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub amount: Option<Decimal>,
    pub department: String,
    pub requested_by: Identity,
    pub description: String,
    pub status: ItemStatus,
    pub chain: ApprovalChain,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovableItem {
    pub fn from_draft(draft: ApprovableItemDraft, chain: ApprovalChain, at: DateTime<Utc>) -> Self {
        Self {
            status: chain.status(),
            id: draft.id,
            kind: draft.kind,
            amount: draft.amount,
            department: draft.department,
            requested_by: draft.requested_by,
            description: draft.description,
            chain,
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn current_level(&self) -> Option<u32> {
        self.chain.current_level()
    }

    /// Chain progress reported against the item's own status, which moves on
    /// to a fulfilment status after the chain closes.
    pub fn progress(&self) -> ProgressSummary {
        ProgressSummary { status: self.status, ..summarize(&self.chain) }
    }

    pub fn apply_outcome(&mut self, outcome: DecisionOutcome, at: DateTime<Utc>) {
        self.chain = outcome.chain;
        self.status = outcome.status;
        self.updated_at = at;
    }

    /// Moves an approved item into its kind's fulfilment status (disbursed,
    /// processed, completed).
    pub fn finalize(&mut self, at: DateTime<Utc>) -> Result<ItemStatus, WorkflowError> {
        let approved = self.kind.approved_status();
        let Some(fulfilled) = self.kind.fulfilled_status() else {
            return Err(WorkflowError::ItemTerminal { status: self.status });
        };

        if self.status == fulfilled {
            return Err(WorkflowError::ItemTerminal { status: self.status });
        }
        if self.status != approved || !self.chain.is_fully_approved() {
            return Err(WorkflowError::Validation(format!(
                "{} `{}` must be `{approved}` before it can be finalized (currently `{}`)",
                self.kind, self.id, self.status
            )));
        }

        self.status = fulfilled;
        self.updated_at = at;
        Ok(fulfilled)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{ApprovableItem, ApprovableItemDraft, ItemId, ItemKind};
    use crate::domain::chain::{ApprovalChain, ApprovalStep, DepartmentSource, StepStatus};
    use crate::domain::identity::{ApproverRole, Identity};
    use crate::domain::status::ItemStatus;
    use crate::errors::WorkflowError;

    fn item(kind: ItemKind, step_status: StepStatus) -> ApprovableItem {
        let draft = ApprovableItemDraft {
            id: ItemId("REQ-7".to_string()),
            kind,
            amount: Some(Decimal::new(25_000, 2)),
            department: "Operations".to_string(),
            requested_by: Identity::new("Lee", "lee@example.com", "employee", "Operations"),
            description: "Travel advance".to_string(),
            assigned_department: None,
        };
        let mut chain = ApprovalChain::unbuilt(draft.id.clone(), kind, draft.department.clone());
        let mut step = ApprovalStep::placeholder(
            1,
            ApproverRole::Supervisor,
            DepartmentSource::Originating,
            Some("Operations".to_string()),
            Some(Identity::new("Kim", "kim@example.com", "supervisor", "Operations")),
        );
        step.status = step_status;
        if step_status.is_terminal() {
            step.acted_at = Some(Utc::now());
        }
        chain.steps.push(step);
        ApprovableItem::from_draft(draft, chain, Utc::now())
    }

    #[test]
    fn draft_kind_accepts_loose_spelling() {
        let kind: ItemKind = serde_json::from_str("\"Supplier-Invoice\"").expect("kind");
        assert_eq!(kind, ItemKind::SupplierInvoice);
        assert_eq!("IT request".parse::<ItemKind>().ok(), Some(ItemKind::ItRequest));
        assert!("expense".parse::<ItemKind>().is_err());
    }

    #[test]
    fn approved_cash_request_finalizes_to_disbursed() {
        let mut item = item(ItemKind::CashRequest, StepStatus::Approved);
        assert_eq!(item.status, ItemStatus::Approved);

        let status = item.finalize(Utc::now()).expect("approved cash request finalizes");
        assert_eq!(status, ItemStatus::Disbursed);
        assert_eq!(item.status, ItemStatus::Disbursed);

        let error = item.finalize(Utc::now()).expect_err("second finalize is rejected");
        assert!(matches!(error, WorkflowError::ItemTerminal { status: ItemStatus::Disbursed }));
    }

    #[test]
    fn pending_item_cannot_be_finalized() {
        let mut item = item(ItemKind::ItRequest, StepStatus::PendingActive);
        let error = item.finalize(Utc::now()).expect_err("pending item cannot finalize");
        assert!(matches!(error, WorkflowError::Validation(_)));
        assert_eq!(item.status, ItemStatus::PendingSupervisor);
    }

    #[test]
    fn justification_has_no_fulfilment_stage() {
        let mut item = item(ItemKind::Justification, StepStatus::Approved);
        assert_eq!(item.status, ItemStatus::Completed);
        assert!(item.finalize(Utc::now()).is_err());
    }
}
