//! Syntax decorations over fenced code in the editor buffer
//!
//! Every pass clears all previous marks and rebuilds them from the current
//! buffer. Marks come from the top-level typed tokens of each content line;
//! offsets accumulate token lengths so marks on a line never overlap.

use crate::editor::buffer::LineSource;
use crate::editor::fence::{scan_fences, FencedRegion};
use crate::markdown::resolver::LanguageResolver;
use crate::markdown::syntax::{Token, Tokenizer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Style class applied to the language tag on an opening fence
pub const LANG_CLASS: &str = "token-lang";

/// A decorated span of one line, in characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HighlightMark {
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub class: String,
}

impl HighlightMark {
    pub fn new(line: usize, start: usize, end: usize, class: impl Into<String>) -> Self {
        Self {
            line,
            start,
            end,
            class: class.into(),
        }
    }
}

/// Where marks are drawn; each mark owns a handle until cleared
pub trait MarkTarget {
    type Handle;

    fn mark(&mut self, mark: &HighlightMark) -> Self::Handle;
    fn clear(&mut self, handle: Self::Handle);
}

/// In-memory mark store
#[derive(Debug, Default)]
pub struct MarkLayer {
    next_id: u64,
    marks: BTreeMap<u64, HighlightMark>,
}

impl MarkLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Live marks ordered by position
    pub fn marks(&self) -> Vec<HighlightMark> {
        let mut marks: Vec<HighlightMark> = self.marks.values().cloned().collect();
        marks.sort();
        marks
    }

    /// Live marks on one line
    pub fn line_marks(&self, line: usize) -> Vec<HighlightMark> {
        self.marks()
            .into_iter()
            .filter(|mark| mark.line == line)
            .collect()
    }
}

impl MarkTarget for MarkLayer {
    type Handle = u64;

    fn mark(&mut self, mark: &HighlightMark) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.marks.insert(id, mark.clone());
        id
    }

    fn clear(&mut self, handle: u64) {
        self.marks.remove(&handle);
    }
}

/// Marks for the typed tokens of one tokenized line
pub fn line_marks(line: usize, tokens: &[Token]) -> Vec<HighlightMark> {
    let mut marks = Vec::new();
    let mut offset = 0;
    for token in tokens {
        let len = token.len();
        if let Some(kind) = token.kind() {
            if len > 0 {
                marks.push(HighlightMark::new(
                    line,
                    offset,
                    offset + len,
                    format!("token-{}", kind),
                ));
            }
        }
        offset += len;
    }
    marks
}

/// Rebuilds code decorations for a buffer
pub struct TokenDecorator<T: MarkTarget> {
    target: T,
    handles: Vec<T::Handle>,
    marks: Vec<HighlightMark>,
    regions: Vec<FencedRegion>,
    resolver: LanguageResolver,
    tokenizer: Arc<dyn Tokenizer>,
    passes: u64,
}

impl<T: MarkTarget> TokenDecorator<T> {
    pub fn new(target: T, resolver: LanguageResolver, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            target,
            handles: Vec::new(),
            marks: Vec::new(),
            regions: Vec::new(),
            resolver,
            tokenizer,
            passes: 0,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Marks produced by the last pass, in creation order
    pub fn marks(&self) -> &[HighlightMark] {
        &self.marks
    }

    /// Regions found by the last pass, with their grammar ids
    pub fn regions(&self) -> &[FencedRegion] {
        &self.regions
    }

    /// Number of completed passes
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Remove every mark created by earlier passes
    pub fn clear(&mut self) {
        for handle in self.handles.drain(..) {
            self.target.clear(handle);
        }
        self.marks.clear();
    }

    /// Clear and recompute all decorations from `source`
    pub fn redecorate<S: LineSource + ?Sized>(&mut self, source: &S) -> &[HighlightMark] {
        self.clear();

        let mut regions = scan_fences(source);
        let mut marks = Vec::new();

        for region in &mut regions {
            let tag = region.tag.as_ref().map(|t| t.text.as_str()).unwrap_or("");
            let resolution = self.resolver.resolve(tag);
            let grammar = self.resolver.grammar(&resolution.grammar_id);

            if let Some(tag) = &region.tag {
                marks.push(HighlightMark::new(
                    region.open_line,
                    tag.start,
                    tag.end,
                    LANG_CLASS,
                ));
            }

            for line in region.content.clone() {
                let text = source.line_text(line).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                let tokens = self.tokenizer.tokenize(&text, &grammar);
                marks.extend(line_marks(line, &tokens));
            }

            region.grammar_id = Some(resolution.grammar_id);
        }

        for mark in &marks {
            let handle = self.target.mark(mark);
            self.handles.push(handle);
        }

        log::debug!(
            "Decorated {} regions with {} marks",
            regions.len(),
            marks.len()
        );
        self.regions = regions;
        self.marks = marks;
        self.passes += 1;
        &self.marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::buffer::TextBuffer;
    use crate::markdown::grammar::{BundledGrammarSource, GrammarRegistry, PLAINTEXT};
    use crate::markdown::syntax::{tokens_len, SyntectTokenizer};

    fn decorator() -> TokenDecorator<MarkLayer> {
        let bundled = BundledGrammarSource::new();
        let resolver = LanguageResolver::new(GrammarRegistry::new(), Arc::new(bundled.clone()));
        resolver.preload(&bundled, &["javascript", "rust"]);
        TokenDecorator::new(MarkLayer::new(), resolver, Arc::new(SyntectTokenizer::new()))
    }

    const DOC: &str = "# Notes\n\n```js\nconst x = 1; // one\nconsole.log(x)\n```\n\nplain `code`\n";

    #[test]
    fn test_line_marks_follow_token_lengths() {
        let tokens = vec![
            Token::typed("keyword", vec![Token::text("let")]),
            Token::text(" "),
            Token::typed(
                "string",
                vec![
                    Token::typed("punctuation", vec![Token::text("'")]),
                    Token::text("hé"),
                    Token::typed("punctuation", vec![Token::text("'")]),
                ],
            ),
            Token::typed("comment", vec![]),
        ];
        let marks = line_marks(4, &tokens);
        assert_eq!(
            marks,
            vec![
                HighlightMark::new(4, 0, 3, "token-keyword"),
                HighlightMark::new(4, 4, 8, "token-string"),
            ]
        );
        assert_eq!(marks.last().unwrap().end, tokens_len(&tokens));
    }

    #[test]
    fn test_marks_cover_code_lines_only() {
        let mut decorator = decorator();
        let buffer = TextBuffer::from_text(DOC);
        let marks = decorator.redecorate(&buffer).to_vec();

        assert!(marks.contains(&HighlightMark::new(2, 3, 5, LANG_CLASS)));
        assert!(marks.iter().any(|m| m.line == 3 && m.class != LANG_CLASS));
        assert!(marks.iter().all(|m| (2..=4).contains(&m.line)));
        assert_eq!(decorator.regions()[0].grammar_id.as_deref(), Some("javascript"));
    }

    #[test]
    fn test_marks_do_not_overlap() {
        let mut decorator = decorator();
        let buffer = TextBuffer::from_text(DOC);
        decorator.redecorate(&buffer);

        for line in 3..=4 {
            let marks = decorator.target().line_marks(line);
            let line_len = buffer.line_text(line).unwrap().chars().count();
            for pair in marks.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
            assert!(marks.iter().all(|m| m.end <= line_len));
        }
    }

    #[test]
    fn test_redecorate_is_idempotent() {
        let mut decorator = decorator();
        let buffer = TextBuffer::from_text(DOC);
        let first = decorator.redecorate(&buffer).to_vec();
        let second = decorator.redecorate(&buffer).to_vec();

        assert_eq!(first, second);
        assert_eq!(decorator.target().len(), second.len());
        assert_eq!(decorator.passes(), 2);
    }

    #[test]
    fn test_buffer_change_drops_old_marks() {
        let mut decorator = decorator();
        let mut buffer = TextBuffer::from_text(DOC);
        decorator.redecorate(&buffer);
        assert!(!decorator.target().is_empty());

        buffer.set_content("no code here\n");
        decorator.redecorate(&buffer);
        assert!(decorator.target().is_empty());
        assert!(decorator.regions().is_empty());
    }

    #[test]
    fn test_unknown_language_falls_back_to_plaintext() {
        let mut decorator = decorator();
        let buffer = TextBuffer::from_text("```\nlet a = 1;\n```\n```zzz\nstuff\n");
        let marks = decorator.redecorate(&buffer).to_vec();

        assert_eq!(marks, vec![HighlightMark::new(3, 3, 6, LANG_CLASS)]);
        assert_eq!(decorator.regions()[0].grammar_id.as_deref(), Some(PLAINTEXT));
        assert_eq!(decorator.regions()[1].grammar_id.as_deref(), Some(PLAINTEXT));
        assert!(!decorator.regions()[1].is_terminated());
    }
}
