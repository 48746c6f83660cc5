use chainflow_core::chain::{Decision, DecisionInput};
use chainflow_core::config::LoadOptions;
use chainflow_core::domain::identity::DocumentRef;
use chainflow_core::domain::item::ItemId;
use chainflow_db::DecisionRequest;
use chrono::Utc;

use crate::commands::{CommandResult, ServiceContext};

#[derive(Debug, Clone)]
pub struct DecideArgs {
    pub item_id: String,
    pub actor: String,
    pub level: u32,
    pub decision: Decision,
    pub comments: Option<String>,
    pub document: Option<String>,
    pub assign_department: Option<String>,
    pub expected_version: Option<u64>,
}

impl DecideArgs {
    fn into_request(self) -> DecisionRequest {
        let mut input = DecisionInput::approve(Utc::now());
        input.decision = self.decision;
        input.comments = self.comments;
        input.signed_document = self.document.map(DocumentRef);
        input.assign_department = self.assign_department;

        DecisionRequest {
            item_id: ItemId(self.item_id),
            actor_email: self.actor,
            level: self.level,
            expected_version: self.expected_version,
            input,
        }
    }
}

pub fn run(options: &LoadOptions, args: DecideArgs) -> CommandResult {
    let context = match ServiceContext::open("decide", options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let request = args.into_request();
    let result = context.runtime.block_on(context.service.decide(request, &context.correlation_id));
    context.respond("decide", "decision recorded", result)
}
