pub mod pattern;
pub mod tool_filter;

pub use pattern::{Pattern, matches};
pub use tool_filter::{CompiledFilter, apply_filters, filter_tools};
