//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - anthropic messages/tools, sent from the agent to the LLM
//! - tool calls, sent from the agent to the systems providing capabilities
//!
//! The wire format is converted at the provider boundary; everything else
//! in the crate works with these internal structs.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
