pub mod commands;
pub mod sinks;

use std::path::PathBuf;
use std::process::ExitCode;

use chainflow_core::chain::Decision;
use chainflow_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::decide::DecideArgs;

#[derive(Debug, Parser)]
#[command(
    name = "chainflow",
    about = "Chainflow approval chain CLI",
    long_about = "Submit approvable items, record approver decisions, and inspect approval progress.",
    after_help = "Examples:\n  chainflow submit draft.json\n  chainflow decide CR-1 --actor kim@example.com --level 1 --decision approve\n  chainflow inbox kim@example.com"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a chainflow.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Submit an item draft (JSON file) and build its approval chain")]
    Submit {
        #[arg(help = "Path to the JSON item draft")]
        draft: PathBuf,
    },
    #[command(about = "Approve or reject the active step of an item")]
    Decide {
        item_id: String,
        #[arg(long, help = "Email of the acting approver")]
        actor: String,
        #[arg(long, help = "Level the decision targets")]
        level: u32,
        #[arg(long, value_enum)]
        decision: DecisionArg,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long, help = "Reference to the uploaded signed document")]
        document: Option<String>,
        #[arg(long, help = "Department to route the next assigned step to")]
        assign_department: Option<String>,
        #[arg(long, help = "Reject the decision if the item moved past this version")]
        expected_version: Option<u64>,
    },
    #[command(about = "Move an approved item into its fulfilment status")]
    Finalize {
        item_id: String,
        #[arg(long)]
        actor: String,
    },
    #[command(about = "Show an item with its approval progress and history")]
    Show { item_id: String },
    #[command(about = "List items waiting on an approver")]
    Inbox { email: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for Decision {
    fn from(value: DecisionArg) -> Self {
        match value {
            DecisionArg::Approve => Decision::Approve,
            DecisionArg::Reject => Decision::Reject,
        }
    }
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable. Fails if a subscriber is already installed.
pub fn init_logging(config: &AppConfig) -> Result<(), LoggingInitError> {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

pub type LoggingInitError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    // An unloadable config is reported by the command itself.
    if let Ok(config) = AppConfig::load(options.clone()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("chainflow: logging disabled: {error}");
        }
    }

    let result = match cli.command {
        Command::Config => commands::config::run(&options),
        Command::Migrate => commands::migrate::run(&options),
        Command::Submit { draft } => commands::submit::run(&options, &draft),
        Command::Decide {
            item_id,
            actor,
            level,
            decision,
            comments,
            document,
            assign_department,
            expected_version,
        } => commands::decide::run(
            &options,
            DecideArgs {
                item_id,
                actor,
                level,
                decision: decision.into(),
                comments,
                document,
                assign_department,
                expected_version,
            },
        ),
        Command::Finalize { item_id, actor } => {
            commands::finalize::run(&options, &item_id, &actor)
        }
        Command::Show { item_id } => commands::show::run(&options, &item_id),
        Command::Inbox { email } => commands::inbox::run(&options, &email),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
