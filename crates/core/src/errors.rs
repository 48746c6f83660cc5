use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::item::ItemKind;
use crate::domain::status::ItemStatus;
use crate::routing::RoutingError;

/// Failures returned by the workflow engine. The engine never logs or
/// swallows these; a failed call leaves its input untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("invalid amount for {kind}: {reason}")]
    InvalidAmount { kind: ItemKind, amount: Option<Decimal>, reason: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("level {level} requires a signed document; upload the signed document first")]
    MissingDocument { level: u32 },
    #[error("decision targets level {received} but the item is waiting on level {current}")]
    StaleDecision { current: u32, received: u32 },
    #[error("item is closed with status `{status}` and accepts no further decisions")]
    ItemTerminal { status: ItemStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("`{actor}` may not act on item `{item_id}`: {reason}")]
    Unauthorized { item_id: String, actor: String, reason: String },
    #[error("item `{0}` was not found")]
    NotFound(String),
    #[error("item `{item_id}` changed since version {expected_version}")]
    Conflict { item_id: String, expected_version: u64 },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not the approver for the current step.",
            Self::NotFound { .. } => "The requested item does not exist.",
            Self::Conflict { .. } => {
                "This item was already acted on. Reload it to see the latest state."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            ApplicationError::Workflow(
                WorkflowError::StaleDecision { .. } | WorkflowError::ItemTerminal { .. },
            )
            | ApplicationError::Conflict { .. } => Self::Conflict { message, correlation_id },
            ApplicationError::Workflow(WorkflowError::InvariantViolation(_)) => {
                Self::Internal { message, correlation_id }
            }
            ApplicationError::Workflow(_) => Self::BadRequest { message, correlation_id },
            ApplicationError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
            ApplicationError::NotFound(_) => Self::NotFound { message, correlation_id },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
