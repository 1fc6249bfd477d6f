//! Conversion between runtime types and provider wire JSON
//!
//! Outbound messages and tools are shaped per [`messages::MessageDialect`];
//! inbound bodies are unwrapped and parsed by [`response`].

pub mod messages;
pub mod response;

pub use messages::{MessageDialect, message_to_wire, messages_to_wire, tool_to_wire, tools_to_wire};
pub use response::{GenerateResponse, extract_tool_calls, parse_count, parse_generate_response, parse_usage, unwrap_envelope};
