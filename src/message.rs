//! Application message types
//!
//! Defines all messages that can be sent to the session's update function.
//! Messages are organized by category for clear handling and routing.

use crate::markdown::style::{BindingId, InputKind};

/// Main application message enum
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Editor buffer operations
    Editor(EditorMessage),

    /// Style panel operations
    Style(StyleMessage),

    /// Internal async operation results
    Internal(InternalMessage),

    /// No-op message
    None,
}

/// Editor-related messages
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMessage {
    /// Replace the whole buffer
    SetText(String),

    /// Insert text at a line and column
    Insert {
        line: usize,
        col: usize,
        text: String,
    },

    /// The buffer was changed by someone else; refresh derived views
    Changed,
}

/// Style panel messages
#[derive(Debug, Clone, PartialEq)]
pub enum StyleMessage {
    /// Register an input control for an option
    Bind { name: String, kind: InputKind },

    /// Input event from a bound control
    Input { binding: BindingId, raw: String },
}

/// Internal messages for async operation results
#[derive(Debug, Clone, PartialEq)]
pub enum InternalMessage {
    /// A grammar finished loading and is resident
    GrammarResident(String),

    /// A grammar load failed; the language stays on plaintext
    GrammarFailed(String),

    /// The preview surface fired its load event
    SurfaceLoaded,
}
