use chainflow_core::config::LoadOptions;
use chainflow_core::domain::item::ItemId;

use crate::commands::{CommandResult, ServiceContext};

pub fn run(options: &LoadOptions, item_id: &str, actor: &str) -> CommandResult {
    let context = match ServiceContext::open("finalize", options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let item_id = ItemId(item_id.to_string());
    let result =
        context.runtime.block_on(context.service.finalize(&item_id, actor, &context.correlation_id));
    context.respond("finalize", "item finalized", result)
}
