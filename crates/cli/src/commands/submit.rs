use std::fs;
use std::path::Path;

use anyhow::Context;
use chainflow_core::config::LoadOptions;
use chainflow_core::domain::item::ApprovableItemDraft;

use crate::commands::{CommandResult, ServiceContext, EXIT_INPUT};

pub fn run(options: &LoadOptions, draft_path: &Path) -> CommandResult {
    let draft = match read_draft(draft_path) {
        Ok(draft) => draft,
        Err(error) => {
            return CommandResult::failure("submit", "invalid_input", format!("{error:#}"), EXIT_INPUT)
        }
    };

    let context = match ServiceContext::open("submit", options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let result = context.runtime.block_on(context.service.submit(draft, &context.correlation_id));
    context.respond("submit", "item submitted for approval", result)
}

fn read_draft(path: &Path) -> anyhow::Result<ApprovableItemDraft> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read draft `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("draft `{}` is not a valid item draft", path.display()))
}
