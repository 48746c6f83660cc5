use chainflow_core::config::{AppConfig, LoadOptions};

use crate::commands::{connect_and_migrate, new_runtime, CommandResult, EXIT_CONFIG};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let outcome = new_runtime("migrate").and_then(|runtime| {
        let pool = connect_and_migrate("migrate", &runtime, &config)?;
        runtime.block_on(pool.close());
        Ok(())
    });

    match outcome {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
