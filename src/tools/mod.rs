//! Tool provider boundary, routing, and result rendering.

pub mod arguments;
pub mod output;
pub mod provider;
pub mod router;
pub mod types;

pub use arguments::parse_tool_arguments;
pub use output::render_tool_output;
pub use provider::ToolProvider;
pub use router::ToolRouter;
pub use types::ToolDescriptor;
