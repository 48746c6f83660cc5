pub mod chain;
pub mod identity;
pub mod item;
pub mod status;
