//! File handler module for md2pdf studio
//!
//! Handles getting Markdown into the session:
//! - Reading local files with size and type checks
//! - Fetching documents from URLs
//! - File watching for the CLI watch loop

pub mod io;
pub mod remote;
pub mod watcher;

pub use io::*;
pub use remote::*;
pub use watcher::*;
