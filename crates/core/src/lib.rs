pub mod audit;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod routing;

pub use chain::{
    apply_decision, build_chain, can_act, summarize, Authorization, ChainBuilder, Decision,
    DecisionInput, DecisionOutcome, HistoryEntry, ProgressSummary,
};
pub use domain::chain::{ApprovalChain, ApprovalStep, DepartmentSource, StepStatus};
pub use domain::identity::{ApproverRole, DocumentRef, Identity};
pub use domain::item::{ApprovableItem, ApprovableItemDraft, ItemId, ItemKind};
pub use domain::status::ItemStatus;
pub use errors::{ApplicationError, InterfaceError, WorkflowError};
pub use routing::{
    ApproverResolver, DirectoryEntry, InMemoryDirectory, KindPolicy, RoutingConfig, RoutingError,
    RoutingRule, StepTemplate,
};
