//! md2pdf studio - Markdown authoring core with live preview and PDF export
//!
//! The library holds the headless session ([`app::App`]) and every part it
//! wires together; the `md2pdf` binary drives it from the command line.

pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod file_handler;
pub mod markdown;
pub mod message;
pub mod utils;

pub use app::{App, Effect, ExportMode};
pub use config::Config;
pub use error::{AppError, AppResult};
