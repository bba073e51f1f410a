//! Markdown module for md2pdf studio
//!
//! Handles everything between source text and rendered output:
//! - Token trees and the syntect tokenizer
//! - Grammar loading and language resolution
//! - Style options and stylesheet generation
//! - Preview rendering
//! - PDF export through the render API

pub mod css;
pub mod export;
pub mod grammar;
pub mod preview;
pub mod resolver;
pub mod style;
pub mod syntax;

pub use export::{
    Artifact, ExportError, ExportResult, JobState, PollPolicy, RenderJobClient, RenderPayload,
    Submission,
};
pub use grammar::{
    BundledGrammarSource, Grammar, GrammarError, GrammarRegistry, GrammarSource,
    HttpGrammarSource, LayeredGrammarSource, PLAINTEXT,
};
pub use preview::{
    CodeHighlighter, HeadlessSurface, LoadStatus, MarkdownConverter, PreviewRenderer,
    PreviewSurface, ScrollOffset, SurfaceState, SyntaxHighlighter,
};
pub use resolver::{normalize_tag, GrammarEvent, LanguageResolver, Resolution};
pub use style::{normalize_hex, InputKind, StyleOptions, StyleStore, StyleValue, STYLE_SCHEMA};
pub use syntax::{tokens_len, tokens_to_html, SyntectTokenizer, Token, Tokenizer};
