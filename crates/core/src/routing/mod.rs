pub mod directory;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::chain::DepartmentSource;
use crate::domain::identity::ApproverRole;
use crate::domain::item::{ApprovableItemDraft, ItemKind};

pub use directory::{ApproverResolver, DirectoryEntry, InMemoryDirectory};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub role: ApproverRole,
    pub department: DepartmentSource,
    /// Recorded as approved at build time. Only allowed on leading steps.
    #[serde(default)]
    pub auto_approve: bool,
}

impl StepTemplate {
    pub fn new(role: ApproverRole, department: DepartmentSource) -> Self {
        Self { role, department, auto_approve: false }
    }

    pub fn auto_approved(mut self) -> Self {
        self.auto_approve = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub steps: Vec<StepTemplate>,
}

fn default_priority() -> i32 {
    100
}

impl RoutingRule {
    fn matches(&self, draft: &ApprovableItemDraft) -> bool {
        if self.kind != draft.kind {
            return false;
        }

        if let Some(department) = &self.department {
            let department = normalize_key(department);
            if department != "*" && department != normalize_key(&draft.department) {
                return false;
            }
        }

        // Amount bounds only match when the draft carries an amount.
        if let Some(min_amount) = self.min_amount {
            if !draft.amount.is_some_and(|amount| amount >= min_amount) {
                return false;
            }
        }

        if let Some(max_amount) = self.max_amount {
            if !draft.amount.is_some_and(|amount| amount <= max_amount) {
                return false;
            }
        }

        true
    }

    fn specificity(&self) -> usize {
        usize::from(self.department.is_some())
            + usize::from(self.min_amount.is_some())
            + usize::from(self.max_amount.is_some())
    }
}

/// Per-kind rules for how decisions are validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindPolicy {
    pub kind: ItemKind,
    #[serde(default)]
    pub requires_document_signing: bool,
    #[serde(default)]
    pub comments_required_on_approval: bool,
    #[serde(default)]
    pub amount_required: bool,
}

impl KindPolicy {
    pub fn standard(kind: ItemKind) -> Self {
        match kind {
            ItemKind::CashRequest | ItemKind::EmployeeInvoice => Self {
                kind,
                requires_document_signing: false,
                comments_required_on_approval: false,
                amount_required: true,
            },
            ItemKind::SupplierInvoice => Self {
                kind,
                requires_document_signing: true,
                comments_required_on_approval: false,
                amount_required: true,
            },
            ItemKind::ItRequest => Self {
                kind,
                requires_document_signing: false,
                comments_required_on_approval: false,
                amount_required: false,
            },
            ItemKind::Justification => Self {
                kind,
                requires_document_signing: false,
                comments_required_on_approval: true,
                amount_required: false,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no routing rule matches {kind} from department `{department}` with amount {amount:?}")]
    NoMatchingRule { kind: ItemKind, department: String, amount: Option<Decimal> },
    #[error("no `{role}` approver is registered for department `{department}`")]
    UnresolvedApprover { role: ApproverRole, department: String },
    #[error("level {level} (`{role}`) needs an assigned department before it can be activated")]
    MissingAssignment { level: u32, role: ApproverRole },
    #[error("routing rule `{rule_id}` is invalid: {reason}")]
    InvalidRule { rule_id: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub rules: Vec<RoutingRule>,
    #[serde(default)]
    pub policies: Vec<KindPolicy>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RoutingConfig {
    /// Routing used by the enterprise dashboards.
    pub fn standard() -> Self {
        use ApproverRole::{
            DepartmentHead, FinanceOfficer, HeadOfBusiness, ItDepartment, Supervisor, SupplyChain,
        };
        use DepartmentSource::{Assigned, Originating};

        let fixed = |name: &str| DepartmentSource::Fixed { name: name.to_string() };
        let rule = |id: &str, kind: ItemKind, steps: Vec<StepTemplate>| RoutingRule {
            id: id.to_string(),
            kind,
            department: None,
            min_amount: None,
            max_amount: None,
            priority: default_priority(),
            steps,
        };

        Self {
            rules: vec![
                rule(
                    "cash-request-supervisor",
                    ItemKind::CashRequest,
                    vec![StepTemplate::new(Supervisor, Originating)],
                ),
                rule(
                    "employee-invoice-assignment",
                    ItemKind::EmployeeInvoice,
                    vec![
                        StepTemplate::new(FinanceOfficer, fixed("Finance")),
                        StepTemplate::new(DepartmentHead, Assigned),
                    ],
                ),
                rule(
                    "supplier-invoice-signing",
                    ItemKind::SupplierInvoice,
                    vec![
                        StepTemplate::new(SupplyChain, fixed("Supply Chain")).auto_approved(),
                        StepTemplate::new(DepartmentHead, Assigned),
                        StepTemplate::new(HeadOfBusiness, fixed("Executive")),
                        StepTemplate::new(FinanceOfficer, fixed("Finance")),
                    ],
                ),
                rule(
                    "it-request-review",
                    ItemKind::ItRequest,
                    vec![
                        StepTemplate::new(Supervisor, Originating),
                        StepTemplate::new(ItDepartment, fixed("IT")),
                    ],
                ),
                rule(
                    "justification-review",
                    ItemKind::Justification,
                    vec![
                        StepTemplate::new(Supervisor, Originating),
                        StepTemplate::new(FinanceOfficer, fixed("Finance")),
                    ],
                ),
            ],
            policies: ItemKind::ALL.into_iter().map(KindPolicy::standard).collect(),
        }
    }

    pub fn policy_for(&self, kind: ItemKind) -> KindPolicy {
        self.policies
            .iter()
            .find(|policy| policy.kind == kind)
            .copied()
            .unwrap_or_else(|| KindPolicy::standard(kind))
    }

    /// Lowest priority value wins, then the most specific rule, then rule id.
    pub fn match_rule(&self, draft: &ApprovableItemDraft) -> Option<&RoutingRule> {
        let mut matches: Vec<&RoutingRule> =
            self.rules.iter().filter(|rule| rule.matches(draft)).collect();
        matches.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| right.specificity().cmp(&left.specificity()))
                .then_with(|| left.id.cmp(&right.id))
        });
        matches.into_iter().next()
    }

    pub fn validate(&self) -> Result<(), RoutingError> {
        for rule in &self.rules {
            let invalid = |reason: &str| RoutingError::InvalidRule {
                rule_id: rule.id.clone(),
                reason: reason.to_string(),
            };

            if rule.id.trim().is_empty() {
                return Err(invalid("rule id must not be empty"));
            }
            if rule.steps.is_empty() {
                return Err(invalid("at least one step is required"));
            }
            if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
                if min > max {
                    return Err(invalid("min_amount must not exceed max_amount"));
                }
            }
            if rule.min_amount.is_some_and(|min| min.is_sign_negative())
                || rule.max_amount.is_some_and(|max| max.is_sign_negative())
            {
                return Err(invalid("amount bounds must not be negative"));
            }

            let leading_auto = rule.steps.iter().take_while(|step| step.auto_approve).count();
            if rule.steps.iter().skip(leading_auto).any(|step| step.auto_approve) {
                return Err(invalid("auto_approve is only allowed on leading steps"));
            }
            if rule
                .steps
                .iter()
                .take(leading_auto)
                .any(|step| step.department == DepartmentSource::Assigned)
            {
                return Err(invalid("auto-approved steps must not depend on an assigned department"));
            }
            for step in &rule.steps {
                if let DepartmentSource::Fixed { name } = &step.department {
                    if name.trim().is_empty() {
                        return Err(invalid("fixed department names must not be empty"));
                    }
                }
            }
        }

        let mut ids: Vec<&str> = self.rules.iter().map(|rule| rule.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(RoutingError::InvalidRule {
                rule_id: pair[0].to_string(),
                reason: "rule ids must be unique".to_string(),
            });
        }

        Ok(())
    }
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
