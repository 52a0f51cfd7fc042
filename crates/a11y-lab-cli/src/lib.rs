//! a11y-lab operator CLI: drive accessibility experiments from a terminal.

pub mod config;
pub mod repl;
pub mod scheduler;
pub mod session;
pub mod types;

pub use config::resolve_experiments_path;
pub use scheduler::TokioScheduler;
pub use session::LabSessionManager;
pub use types::{SessionError, SessionResult};
