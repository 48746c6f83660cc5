use serde::{Deserialize, Serialize};

use crate::domain::identity::{ApproverRole, Identity};

use super::normalize_key;

/// Resolves the person holding `role` in `department`. Injected into chain
/// construction and decision processing so that late-bound steps (for
/// example a department head picked after assignment) are looked up only
/// when they become active.
pub trait ApproverResolver {
    fn resolve_approver(&self, role: ApproverRole, department: &str) -> Option<Identity>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub email: String,
    pub role: ApproverRole,
    pub department: String,
}

impl DirectoryEntry {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: ApproverRole,
        department: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), email: email.into(), role, department: department.into() }
    }

    fn identity(&self) -> Identity {
        Identity::new(&self.name, &self.email, self.role.as_str(), &self.department)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    entries: Vec<DirectoryEntry>,
}

impl InMemoryDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }
}

impl ApproverResolver for InMemoryDirectory {
    fn resolve_approver(&self, role: ApproverRole, department: &str) -> Option<Identity> {
        let department = normalize_key(department);
        // First match wins; directory order is the tie-breaker.
        self.entries
            .iter()
            .find(|entry| entry.role == role && normalize_key(&entry.department) == department)
            .map(DirectoryEntry::identity)
    }
}
