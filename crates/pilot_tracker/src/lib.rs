mod log;
mod sink;

pub use log::{Guard, init_tracing};
pub use sink::TracingSink;
