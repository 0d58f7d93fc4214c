mod config;
mod quota_config;
mod stream_config;

pub use config::*;
pub use quota_config::*;
pub use stream_config::*;
