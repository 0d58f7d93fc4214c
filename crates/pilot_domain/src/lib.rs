mod conversation;
mod conversation_markdown;
mod error;
mod event;
mod log_record;
mod message;
mod run;
mod services;
mod tool_call;
mod tool_name;
mod tool_result;
mod usage;

pub use conversation::*;
pub use conversation_markdown::*;
pub use error::*;
pub use event::*;
pub use log_record::*;
pub use message::*;
pub use run::*;
pub use services::*;
pub use tool_call::*;
pub use tool_name::*;
pub use tool_result::*;
pub use usage::*;
