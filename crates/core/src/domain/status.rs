use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::identity::ApproverRole;
use crate::domain::item::ItemKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Draft,
    PendingSupervisor,
    PendingFinance,
    PendingFinanceAssignment,
    PendingDepartmentHead,
    PendingHeadOfBusiness,
    PendingSupplyChain,
    PendingItDepartment,
    Approved,
    Completed,
    Denied,
    Rejected,
    Disbursed,
    Processed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingSupervisor => "pending_supervisor",
            Self::PendingFinance => "pending_finance",
            Self::PendingFinanceAssignment => "pending_finance_assignment",
            Self::PendingDepartmentHead => "pending_department_head",
            Self::PendingHeadOfBusiness => "pending_head_of_business",
            Self::PendingSupplyChain => "pending_supply_chain",
            Self::PendingItDepartment => "pending_it_department",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Denied => "denied",
            Self::Rejected => "rejected",
            Self::Disbursed => "disbursed",
            Self::Processed => "processed",
        }
    }

    /// No further decisions are accepted once an item reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved
                | Self::Completed
                | Self::Denied
                | Self::Rejected
                | Self::Disbursed
                | Self::Processed
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Canonical (kind, chain state) -> status table. Every status an item can
// carry while its chain is live comes from here.
impl ItemKind {
    pub fn pending_status(&self, role: ApproverRole) -> ItemStatus {
        match (self, role) {
            (Self::EmployeeInvoice, ApproverRole::FinanceOfficer) => {
                ItemStatus::PendingFinanceAssignment
            }
            (_, ApproverRole::Supervisor) => ItemStatus::PendingSupervisor,
            (_, ApproverRole::FinanceOfficer) => ItemStatus::PendingFinance,
            (_, ApproverRole::DepartmentHead) => ItemStatus::PendingDepartmentHead,
            (_, ApproverRole::HeadOfBusiness) => ItemStatus::PendingHeadOfBusiness,
            (_, ApproverRole::SupplyChain) => ItemStatus::PendingSupplyChain,
            (_, ApproverRole::ItDepartment) => ItemStatus::PendingItDepartment,
        }
    }

    pub fn approved_status(&self) -> ItemStatus {
        match self {
            Self::Justification => ItemStatus::Completed,
            Self::CashRequest | Self::EmployeeInvoice | Self::SupplierInvoice | Self::ItRequest => {
                ItemStatus::Approved
            }
        }
    }

    pub fn rejected_status(&self) -> ItemStatus {
        match self {
            Self::CashRequest | Self::Justification => ItemStatus::Denied,
            Self::EmployeeInvoice | Self::SupplierInvoice | Self::ItRequest => ItemStatus::Rejected,
        }
    }

    /// Status an approved item moves to once the host has fulfilled it.
    pub fn fulfilled_status(&self) -> Option<ItemStatus> {
        match self {
            Self::CashRequest => Some(ItemStatus::Disbursed),
            Self::EmployeeInvoice | Self::SupplierInvoice => Some(ItemStatus::Processed),
            Self::ItRequest => Some(ItemStatus::Completed),
            Self::Justification => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ItemStatus;
    use crate::domain::identity::ApproverRole;
    use crate::domain::item::ItemKind;

    #[test]
    fn finance_step_on_employee_invoice_is_an_assignment() {
        assert_eq!(
            ItemKind::EmployeeInvoice.pending_status(ApproverRole::FinanceOfficer),
            ItemStatus::PendingFinanceAssignment
        );
        assert_eq!(
            ItemKind::SupplierInvoice.pending_status(ApproverRole::FinanceOfficer),
            ItemStatus::PendingFinance
        );
    }

    #[test]
    fn terminal_values_follow_kind() {
        assert_eq!(ItemKind::CashRequest.rejected_status(), ItemStatus::Denied);
        assert_eq!(ItemKind::ItRequest.rejected_status(), ItemStatus::Rejected);
        assert_eq!(ItemKind::Justification.approved_status(), ItemStatus::Completed);
        assert!(ItemKind::Justification.fulfilled_status().is_none());
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&ItemStatus::PendingHeadOfBusiness).expect("serialize");
        assert_eq!(json, "\"pending_head_of_business\"");
    }
}
