pub mod config;
pub mod decide;
pub mod finalize;
pub mod inbox;
pub mod migrate;
pub mod show;
pub mod submit;

use std::sync::Arc;

use chainflow_core::config::{AppConfig, LoadOptions};
use chainflow_core::errors::{ApplicationError, InterfaceError};
use chainflow_db::{connect_with_config, migrations, ApprovalService, DbPool, SqlItemRepository};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::sinks::{TracingAuditSink, TracingNotificationDispatcher};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        correlation_id: &str,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), EXIT_INTERNAL)
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: Some(correlation_id.to_string()),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Renders a service failure through the interface error mapping.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let interface = error.into_interface(correlation_id);
        let (error_class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("bad_request", EXIT_INPUT),
            InterfaceError::Forbidden { .. } => ("forbidden", 7),
            InterfaceError::NotFound { .. } => ("not_found", 8),
            InterfaceError::Conflict { .. } => ("conflict", 9),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", EXIT_DATABASE),
            InterfaceError::Internal { .. } => ("internal", EXIT_INTERNAL),
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} {}", interface.user_message(), interface.message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub(crate) const EXIT_CONFIG: u8 = 2;
pub(crate) const EXIT_RUNTIME: u8 = 3;
pub(crate) const EXIT_DATABASE: u8 = 4;
pub(crate) const EXIT_MIGRATION: u8 = 5;
pub(crate) const EXIT_INPUT: u8 = 6;
pub(crate) const EXIT_INTERNAL: u8 = 10;

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Everything a data command needs: a runtime, a migrated store and the
/// service wired to the configured routing and directory.
pub(crate) struct ServiceContext {
    pub runtime: Runtime,
    pub service: ApprovalService,
    pub correlation_id: String,
}

impl ServiceContext {
    pub fn open(command: &str, options: &LoadOptions) -> Result<Self, CommandResult> {
        let config = AppConfig::load(options.clone()).map_err(|error| {
            CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
        })?;

        let runtime = new_runtime(command)?;
        let pool = connect_and_migrate(command, &runtime, &config)?;

        let service = ApprovalService::new(
            Arc::new(SqlItemRepository::new(pool)),
            Arc::new(config.approver_directory()),
            config.routing.clone(),
            Arc::new(TracingAuditSink),
            Arc::new(TracingNotificationDispatcher),
        );

        Ok(Self { runtime, service, correlation_id: uuid::Uuid::new_v4().to_string() })
    }

    pub fn respond<T: Serialize>(
        &self,
        command: &str,
        message: &str,
        result: Result<T, ApplicationError>,
    ) -> CommandResult {
        match result {
            Ok(data) => {
                CommandResult::success_with_data(command, message, &self.correlation_id, &data)
            }
            Err(error) => CommandResult::from_application_error(command, error, &self.correlation_id),
        }
    }
}

/// Opens the configured database and brings its schema up to date.
pub(crate) fn connect_and_migrate(
    command: &str,
    runtime: &Runtime,
    config: &AppConfig,
) -> Result<DbPool, CommandResult> {
    runtime
        .block_on(async {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
            Ok::<_, (&'static str, String, u8)>(pool)
        })
        .map_err(|(error_class, message, exit_code)| {
            CommandResult::failure(command, error_class, message, exit_code)
        })
}

pub(crate) fn new_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}
