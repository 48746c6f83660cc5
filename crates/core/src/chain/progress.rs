use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::decision::Decision;
use crate::domain::chain::{ApprovalChain, StepStatus};
use crate::domain::identity::{ApproverRole, DocumentRef, Identity};
use crate::domain::status::ItemStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub level: u32,
    pub role: ApproverRole,
    pub approver: Option<Identity>,
    pub decision: Decision,
    pub acted_at: DateTime<Utc>,
    pub comments: Option<String>,
    pub signed_document: Option<DocumentRef>,
    pub auto_approved: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub percent_complete: u8,
    pub current_level: Option<u32>,
    pub total_levels: u32,
    pub approved_levels: u32,
    pub status: ItemStatus,
    pub history: Vec<HistoryEntry>,
}

/// Display and audit aggregates for a chain in any state.
pub fn summarize(chain: &ApprovalChain) -> ProgressSummary {
    let total_levels = chain.total_levels();
    let approved_levels = chain.approved_levels();

    let history = chain
        .steps
        .iter()
        .filter_map(|step| {
            let decision = match step.status {
                StepStatus::Approved => Decision::Approve,
                StepStatus::Rejected => Decision::Reject,
                StepStatus::NotYetReached | StepStatus::PendingActive => return None,
            };
            Some(HistoryEntry {
                level: step.level,
                role: step.role,
                approver: step.approver.clone(),
                decision,
                acted_at: step.acted_at?,
                comments: step.comments.clone(),
                signed_document: step.signed_document.clone(),
                auto_approved: step.auto_approved,
            })
        })
        .collect();

    ProgressSummary {
        percent_complete: percent(approved_levels, total_levels),
        current_level: chain.current_level(),
        total_levels,
        approved_levels,
        status: chain.status(),
        history,
    }
}

// Rounds half up.
fn percent(approved: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let approved = u64::from(approved.min(total));
    let total = u64::from(total);
    u8::try_from((approved * 200 + total) / (total * 2)).unwrap_or(100)
}
