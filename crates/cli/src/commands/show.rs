use chainflow_core::chain::ProgressSummary;
use chainflow_core::config::LoadOptions;
use chainflow_core::domain::item::{ApprovableItem, ItemId};
use chainflow_core::errors::ApplicationError;
use serde::Serialize;

use crate::commands::{CommandResult, ServiceContext};

#[derive(Debug, Serialize)]
struct ItemView {
    item: ApprovableItem,
    progress: ProgressSummary,
}

pub fn run(options: &LoadOptions, item_id: &str) -> CommandResult {
    let context = match ServiceContext::open("show", options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let item_id = ItemId(item_id.to_string());
    let result = context.runtime.block_on(async {
        let item = context.service.get(&item_id).await?;
        Ok::<_, ApplicationError>(ItemView { progress: item.progress(), item })
    });
    context.respond("show", "item loaded", result)
}
