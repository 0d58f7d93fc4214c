mod controller;
mod conversation_store;
mod feed;
mod narration_buffer;
mod quota_gate;
mod termination;
mod tool_call_tracker;

pub use controller::*;
pub use conversation_store::*;
pub use feed::*;
pub use narration_buffer::*;
pub use quota_gate::*;
pub use termination::*;
pub use tool_call_tracker::*;
