pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    RunOptions, execute_run, expand_path, frontier_mode, parse_variable, parse_variables,
    resolve_api_key,
};
