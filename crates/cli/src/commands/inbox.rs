use chainflow_core::config::LoadOptions;

use crate::commands::{CommandResult, ServiceContext};

pub fn run(options: &LoadOptions, email: &str) -> CommandResult {
    let context = match ServiceContext::open("inbox", options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let result = context.runtime.block_on(context.service.inbox(email));
    let message = match &result {
        Ok(items) => format!("{} item(s) awaiting `{email}`", items.len()),
        Err(_) => "inbox unavailable".to_string(),
    };
    context.respond("inbox", &message, result)
}
