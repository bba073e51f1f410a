//! Token trees for code highlighting
//!
//! A tokenizer turns source text into a sequence of [`Token`]s: plain text
//! spans, or typed nodes whose content is itself a sequence of tokens. The
//! editor decorator and the preview's code-block renderer both consume this
//! shape, so lengths and HTML rendering live here.

use crate::markdown::grammar::Grammar;
use syntect::parsing::{ClearAmount, ParseState, Scope, ScopeStackOp};

/// A node of a tokenized line or block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Untyped text
    Text(String),
    /// A typed token such as `keyword` or `string`
    Typed { kind: String, children: Vec<Token> },
}

impl Token {
    pub fn text(text: impl Into<String>) -> Self {
        Token::Text(text.into())
    }

    pub fn typed(kind: impl Into<String>, children: Vec<Token>) -> Self {
        Token::Typed {
            kind: kind.into(),
            children,
        }
    }

    /// Length in characters, summed over nested content
    pub fn len(&self) -> usize {
        match self {
            Token::Text(text) => text.chars().count(),
            Token::Typed { children, .. } => tokens_len(children),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token type, `None` for plain text
    pub fn kind(&self) -> Option<&str> {
        match self {
            Token::Text(_) => None,
            Token::Typed { kind, .. } => Some(kind),
        }
    }
}

/// Total character length of a token sequence
pub fn tokens_len(tokens: &[Token]) -> usize {
    tokens.iter().map(Token::len).sum()
}

/// Render tokens as Prism-compatible `<span class="token kind">` markup
pub fn tokens_to_html(tokens: &[Token]) -> String {
    let mut html = String::new();
    push_tokens_html(&mut html, tokens);
    html
}

fn push_tokens_html(out: &mut String, tokens: &[Token]) {
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(&escape_html(text)),
            Token::Typed { kind, children } => {
                out.push_str("<span class=\"token ");
                out.push_str(&escape_html(kind));
                out.push_str("\">");
                push_tokens_html(out, children);
                out.push_str("</span>");
            }
        }
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Converts text into a token tree using a grammar
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, grammar: &Grammar) -> Vec<Token>;
}

/// Tokenizer backed by syntect's scope parser
///
/// Scope pushes become typed nodes; `source.*`, `text.*` and `meta.*` scopes
/// are transparent so a line does not collapse into one root token.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntectTokenizer;

impl SyntectTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for SyntectTokenizer {
    fn tokenize(&self, text: &str, grammar: &Grammar) -> Vec<Token> {
        let mut state = ParseState::new(grammar.syntax());
        let mut tree = TreeBuilder::new();

        for line in text.split_inclusive('\n') {
            let owned;
            let input = if line.ends_with('\n') {
                line
            } else {
                owned = format!("{}\n", line);
                owned.as_str()
            };

            match state.parse_line(input, grammar.syntax_set()) {
                Ok(ops) => tree.feed(line, &ops),
                Err(err) => {
                    log::debug!("Tokenizing with {} failed: {}", grammar.id(), err);
                    tree.push_text(line);
                }
            }
        }

        tree.finish()
    }
}

struct Frame {
    kind: Option<String>,
    children: Vec<Token>,
}

/// Builds a token tree from a stream of scope operations
struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame {
                kind: None,
                children: Vec::new(),
            }],
        }
    }

    fn feed(&mut self, line: &str, ops: &[(usize, ScopeStackOp)]) {
        let mut cursor = 0;
        for (offset, op) in ops {
            let offset = (*offset).min(line.len());
            if offset > cursor {
                self.push_text(&line[cursor..offset]);
                cursor = offset;
            }
            match op {
                ScopeStackOp::Push(scope) => self.stack.push(Frame {
                    kind: token_kind(*scope),
                    children: Vec::new(),
                }),
                ScopeStackOp::Pop(count) => {
                    for _ in 0..*count {
                        self.close();
                    }
                }
                ScopeStackOp::Clear(amount) => {
                    let count = match amount {
                        ClearAmount::TopN(n) => *n,
                        ClearAmount::All => self.stack.len().saturating_sub(1),
                    };
                    for _ in 0..count {
                        self.close();
                    }
                }
                ScopeStackOp::Restore | ScopeStackOp::Noop => {}
            }
        }
        if cursor < line.len() {
            self.push_text(&line[cursor..]);
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        if let Some(Token::Text(last)) = top.children.last_mut() {
            last.push_str(text);
        } else {
            top.children.push(Token::text(text));
        }
    }

    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Some(parent) = self.stack.last_mut() else {
            return;
        };
        match frame.kind {
            Some(kind) if !frame.children.is_empty() => {
                parent.children.push(Token::Typed {
                    kind,
                    children: frame.children,
                });
            }
            _ => {
                for child in frame.children {
                    match (parent.children.last_mut(), child) {
                        (Some(Token::Text(last)), Token::Text(text)) => last.push_str(&text),
                        (_, child) => parent.children.push(child),
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Token> {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }
}

/// Map a scope such as `constant.numeric.js` to a Prism-style token type
fn token_kind(scope: Scope) -> Option<String> {
    let name = scope.build_string();
    let mut atoms = name.split('.');
    let first = atoms.next()?;
    let second = atoms.next();

    let kind = match (first, second) {
        ("source" | "text" | "meta", _) => return None,
        ("comment", _) => "comment",
        ("string", Some("regexp")) => "regex",
        ("string", _) => "string",
        ("constant", Some("numeric")) => "number",
        ("constant", Some("language")) => "boolean",
        ("constant", Some("character")) => "char",
        ("constant", _) => "constant",
        ("keyword", Some("operator")) => "operator",
        ("keyword", _) | ("storage", _) => "keyword",
        ("entity", Some("name")) => match atoms.next() {
            Some("function") => "function",
            Some("tag") => "tag",
            Some("class") | Some("type") => "class-name",
            _ => "entity",
        },
        ("entity", Some("other")) => "attr-name",
        ("support", Some("function")) => "function",
        ("support", _) => "builtin",
        ("variable", Some("function")) => "function",
        ("variable", _) => "variable",
        ("punctuation", _) => "punctuation",
        ("invalid", _) => "important",
        (other, _) => other,
    };
    Some(kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::grammar::BundledGrammarSource;

    fn javascript() -> Grammar {
        BundledGrammarSource::new()
            .lookup("javascript")
            .expect("bundled javascript grammar")
    }

    #[test]
    fn test_nested_token_length() {
        let token = Token::typed(
            "string",
            vec![
                Token::typed("punctuation", vec![Token::text("\"")]),
                Token::text("héllo"),
                Token::typed("punctuation", vec![Token::text("\"")]),
            ],
        );
        assert_eq!(token.len(), 7);
        assert_eq!(token.kind(), Some("string"));
        assert!(Token::text("").is_empty());
    }

    #[test]
    fn test_token_lengths_cover_line() {
        let grammar = javascript();
        let tokenizer = SyntectTokenizer::new();
        for line in [
            "console.log(1)",
            "const s = \"quoted — text\"; // note",
            "   ",
            "",
            "function f(a, b) { return a + b; }",
        ] {
            let tokens = tokenizer.tokenize(line, &grammar);
            assert_eq!(tokens_len(&tokens), line.chars().count(), "line {:?}", line);
        }
    }

    #[test]
    fn test_typed_tokens_emitted() {
        let tokens = SyntectTokenizer::new().tokenize("console.log(1)", &javascript());
        assert!(tokens.iter().any(|t| t.kind().is_some()));
        assert!(!tokens_to_html(&tokens).is_empty());
    }

    #[test]
    fn test_plaintext_has_no_typed_tokens() {
        let tokens = SyntectTokenizer::new().tokenize("let x = 1;", &Grammar::plaintext());
        assert!(tokens.iter().all(|t| t.kind().is_none()));
        assert_eq!(tokens_len(&tokens), 10);
    }

    #[test]
    fn test_html_rendering_escapes_text() {
        let tokens = vec![
            Token::typed("operator", vec![Token::text("<")]),
            Token::text(" & done"),
        ];
        assert_eq!(
            tokens_to_html(&tokens),
            "<span class=\"token operator\">&lt;</span> &amp; done"
        );
    }
}
