mod event;
mod memory;
mod turn;

pub use event::{NormalizedEvent, ToolRequest, ToolResult, ToolStatus, UsageStats};
pub use memory::MemoryBlock;
pub use turn::{Role, ToolInvocation, ToolOutcome, Turn};
