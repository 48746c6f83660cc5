pub mod builder;
pub mod decision;
pub mod evaluator;
pub mod progress;

pub use builder::{build_chain, ChainBuilder};
pub use decision::{apply_decision, Decision, DecisionInput, DecisionOutcome};
pub use evaluator::{can_act, Authorization};
pub use progress::{summarize, HistoryEntry, ProgressSummary};
