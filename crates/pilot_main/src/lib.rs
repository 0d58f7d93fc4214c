mod cli;
mod replay;

pub use cli::*;
pub use replay::*;
