use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;

/// Role an approver holds on a chain step. Deserialization accepts the same
/// aliases as `FromStr`, so config files may say `finance` or `IT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ApproverRole {
    Supervisor,
    FinanceOfficer,
    DepartmentHead,
    HeadOfBusiness,
    SupplyChain,
    ItDepartment,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::FinanceOfficer => "finance_officer",
            Self::DepartmentHead => "department_head",
            Self::HeadOfBusiness => "head_of_business",
            Self::SupplyChain => "supply_chain",
            Self::ItDepartment => "it_department",
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApproverRole {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "supervisor" => Ok(Self::Supervisor),
            "finance_officer" | "finance" => Ok(Self::FinanceOfficer),
            "department_head" => Ok(Self::DepartmentHead),
            "head_of_business" => Ok(Self::HeadOfBusiness),
            "supply_chain" => Ok(Self::SupplyChain),
            "it_department" | "it" => Ok(Self::ItDepartment),
            other => Err(WorkflowError::Validation(format!("unknown approver role `{other}`"))),
        }
    }
}

impl TryFrom<String> for ApproverRole {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Snapshot of a person taken when a step is resolved. Later changes to the
/// person's real role or department never flow back into a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
}

impl Identity {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: role.into(),
            department: department.into(),
        }
    }

    pub fn matches_email(&self, email: &str) -> bool {
        normalize_email(&self.email) == normalize_email(email)
    }
}

/// Reference to a manually signed artifact held by the host's document store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
