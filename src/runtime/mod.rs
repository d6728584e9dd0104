pub mod mode;
pub mod policy;

pub use mode::{Mode, ModeControl};
pub use policy::{decide, default_tool_policy, PolicyConfig, PolicyDecision, ToolPolicy};
