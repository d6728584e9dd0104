pub mod text;
pub mod transcript;

pub use transcript::{
    format_error, format_invocation, format_memory_blocks, format_turn, format_usage, Line, Style,
};
