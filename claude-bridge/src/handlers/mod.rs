pub mod claude;
pub mod health;

pub use claude::{run_pipe, run_stdin, test_claude};
pub use health::health_check;
