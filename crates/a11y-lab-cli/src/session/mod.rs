//! Session management for experiment runs.

pub mod manager;

pub use manager::{inject_page, render_preview, LabSessionManager};
