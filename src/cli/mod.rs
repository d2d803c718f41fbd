pub mod args;
pub mod helpers;

pub use args::{Cli, Commands, ShowArgs};
pub use helpers::describe_config;
