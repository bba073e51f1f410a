//! Markdown Preview Rendering
//!
//! Converts Markdown to HTML with pulldown-cmark, wraps it in a styled host
//! document and keeps a long-lived [`PreviewSurface`] up to date. The surface
//! is built once; later renders swap the dynamic style block and the body in
//! place and restore the scroll offset.

use crate::config::PreviewConfig;
use crate::markdown::css::preview_css;
use crate::markdown::resolver::LanguageResolver;
use crate::markdown::style::StyleOptions;
use crate::markdown::syntax::{escape_html, tokens_to_html, Tokenizer};
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use std::sync::Arc;

/// Highlighted content of one fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedBlock {
    /// Language class suffix (`language-{language}`); the grammar actually used
    pub language: String,
    /// Inner HTML of the `<code>` element
    pub html: String,
}

/// Renders fenced code for the converter
pub trait CodeHighlighter {
    fn highlight(&self, code: &str, language: &str) -> HighlightedBlock;
}

/// Highlights code with resident grammars, starting loads for missing ones
pub struct SyntaxHighlighter {
    resolver: LanguageResolver,
    tokenizer: Arc<dyn Tokenizer>,
}

impl SyntaxHighlighter {
    pub fn new(resolver: LanguageResolver, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            resolver,
            tokenizer,
        }
    }
}

impl CodeHighlighter for SyntaxHighlighter {
    fn highlight(&self, code: &str, language: &str) -> HighlightedBlock {
        let resolution = self.resolver.resolve(language);
        let grammar = self.resolver.grammar(&resolution.grammar_id);
        let tokens = self.tokenizer.tokenize(code, &grammar);
        HighlightedBlock {
            language: resolution.grammar_id,
            html: tokens_to_html(&tokens),
        }
    }
}

/// Markdown to HTML conversion with GFM extensions and hard line breaks
pub struct MarkdownConverter {
    options: Options,
    line_breaks: bool,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        Self {
            options,
            line_breaks: true,
        }
    }

    /// Render single newlines as `<br />` (on by default)
    pub fn with_line_breaks(mut self, enabled: bool) -> Self {
        self.line_breaks = enabled;
        self
    }

    /// Convert Markdown to body HTML, routing fenced code through `highlighter`
    pub fn to_html(&self, markdown: &str, highlighter: &dyn CodeHighlighter) -> String {
        let mut events = Vec::new();
        let mut block: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_string)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    block = Some((language, String::new()));
                }
                Event::End(Tag::CodeBlock(_)) => {
                    if let Some((language, code)) = block.take() {
                        let rendered = render_code_block(language.as_deref(), &code, highlighter);
                        events.push(Event::Html(CowStr::from(rendered)));
                    }
                }
                Event::Text(text) if block.is_some() => {
                    if let Some((_, code)) = block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::SoftBreak if self.line_breaks => events.push(Event::HardBreak),
                other => events.push(other),
            }
        }

        let mut output = String::new();
        html::push_html(&mut output, events.into_iter());
        output
    }
}

fn render_code_block(
    language: Option<&str>,
    code: &str,
    highlighter: &dyn CodeHighlighter,
) -> String {
    match language {
        Some(tag) => {
            let block = highlighter.highlight(code, tag);
            format!(
                "<pre class=\"language-{lang}\"><code class=\"language-{lang}\">{html}</code></pre>\n",
                lang = escape_html(&block.language),
                html = block.html
            )
        }
        None => format!(
            "<pre class=\"language-none\"><code class=\"language-none\">{}</code></pre>\n",
            escape_html(code)
        ),
    }
}

/// Build the complete host document for a surface
pub fn host_document(assets: &PreviewConfig, css: &str, body: &str) -> String {
    let base = assets
        .base_href
        .as_deref()
        .map(|href| format!("<base href=\"{}\" />\n  ", escape_html(href)))
        .unwrap_or_default();
    let links: String = assets
        .stylesheets
        .iter()
        .map(|href| format!("  <link href=\"{}\" rel=\"stylesheet\" />\n", escape_html(href)))
        .collect();
    let scripts: String = assets
        .scripts
        .iter()
        .map(|src| format!("  <script src=\"{}\"></script>\n", escape_html(src)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8" />
  {base}<link rel="preconnect" href="https://fonts.googleapis.com">
  <link rel="preconnect" href="https://fonts.gstatic.com" crossorigin>
{links}  <style id="{style_id}">
{css}
  </style>
</head>
<body id="{body_id}">
{body}
{scripts}  <script>
{bootstrap}
  </script>
</body>
</html>
"#,
        base = base,
        links = links,
        style_id = DYNAMIC_STYLE_ID,
        css = css,
        body_id = BODY_ID,
        body = body,
        scripts = scripts,
        bootstrap = assets.bootstrap_script,
    )
}

/// Id of the style element replaced on every swap
pub const DYNAMIC_STYLE_ID: &str = "dynamicStyles";

/// Id of the body element whose content is replaced on every swap
pub const BODY_ID: &str = "previewBody";

/// Scroll position of a surface's scrollable root
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Whether a surface finished loading a document synchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Complete,
    /// The load event fires later; call [`PreviewRenderer::surface_loaded`]
    InFlight,
}

/// An isolated document that hosts the preview
pub trait PreviewSurface {
    /// Install a full host document
    fn load(&mut self, document: &str) -> LoadStatus;
    fn scroll_offset(&self) -> ScrollOffset;
    fn scroll_to(&mut self, offset: ScrollOffset);
    /// Replace the text of the dynamic style element
    fn set_dynamic_style(&mut self, css: &str);
    /// Replace the inner HTML of the body element
    fn set_body(&mut self, html: &str);
    /// Re-run client-side highlighting over the current body
    fn highlight_all(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug, Clone)]
struct RenderedPage {
    css: String,
    body: String,
}

/// Keeps a preview surface in sync with the document
pub struct PreviewRenderer<S: PreviewSurface> {
    surface: S,
    state: SurfaceState,
    converter: MarkdownConverter,
    highlighter: Box<dyn CodeHighlighter>,
    assets: PreviewConfig,
    last_document: String,
    queued: Option<RenderedPage>,
}

impl<S: PreviewSurface> PreviewRenderer<S> {
    pub fn new(surface: S, highlighter: Box<dyn CodeHighlighter>, assets: PreviewConfig) -> Self {
        Self {
            surface,
            state: SurfaceState::Uninitialized,
            converter: MarkdownConverter::new(),
            highlighter,
            assets,
            last_document: String::new(),
            queued: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Most recent complete host document
    pub fn last_document(&self) -> &str {
        &self.last_document
    }

    /// Render `source` with `style` into the surface
    pub fn render(&mut self, source: &str, style: &StyleOptions) -> &str {
        let page = RenderedPage {
            css: preview_css(style),
            body: self.converter.to_html(source, self.highlighter.as_ref()),
        };
        self.last_document = host_document(&self.assets, &page.css, &page.body);

        match self.state {
            SurfaceState::Uninitialized => {
                log::debug!("Bootstrapping preview surface");
                self.state = SurfaceState::Initializing;
                if self.surface.load(&self.last_document) == LoadStatus::Complete {
                    self.surface_loaded();
                }
            }
            SurfaceState::Initializing => {
                self.queued = Some(page);
            }
            SurfaceState::Ready => self.swap(&page),
        }

        &self.last_document
    }

    /// Load event of the surface; applies any render queued meanwhile
    pub fn surface_loaded(&mut self) {
        if self.state != SurfaceState::Initializing {
            return;
        }
        self.state = SurfaceState::Ready;
        log::debug!("Preview surface ready");
        match self.queued.take() {
            Some(page) => self.swap(&page),
            None => self.surface.highlight_all(),
        }
    }

    fn swap(&mut self, page: &RenderedPage) {
        let offset = self.surface.scroll_offset();
        self.surface.set_dynamic_style(&page.css);
        self.surface.set_body(&page.body);
        self.surface.highlight_all();
        self.surface.scroll_to(offset);
    }
}

/// In-memory surface with a line-based layout model
///
/// Content height is the number of body lines times `line_height`; scrolling
/// clamps to the content that overflows the viewport.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    document: String,
    style: String,
    body: String,
    scroll: ScrollOffset,
    viewport_height: f64,
    line_height: f64,
    defer_load: bool,
    loads: usize,
    highlight_passes: usize,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(800.0, 20.0)
    }
}

impl HeadlessSurface {
    pub fn new(viewport_height: f64, line_height: f64) -> Self {
        Self {
            document: String::new(),
            style: String::new(),
            body: String::new(),
            scroll: ScrollOffset::default(),
            viewport_height,
            line_height,
            defer_load: false,
            loads: 0,
            highlight_passes: 0,
        }
    }

    /// Report loads as in flight until the renderer is told otherwise
    pub fn with_deferred_load(mut self) -> Self {
        self.defer_load = true;
        self
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Number of full document loads
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn highlight_passes(&self) -> usize {
        self.highlight_passes
    }

    pub fn content_height(&self) -> f64 {
        self.body.lines().count() as f64 * self.line_height
    }

    /// Body content and dynamic style of a full host document
    fn split_document(document: &str) -> (String, String) {
        let style_open = format!("<style id=\"{}\">", DYNAMIC_STYLE_ID);
        let body_open = format!("<body id=\"{}\">", BODY_ID);

        let style = document
            .split_once(style_open.as_str())
            .and_then(|(_, rest)| rest.split_once("</style>"))
            .map(|(css, _)| css.to_string())
            .unwrap_or_default();
        let body = document
            .split_once(body_open.as_str())
            .and_then(|(_, rest)| rest.split_once("<script"))
            .map(|(body, _)| body.to_string())
            .unwrap_or_else(|| document.to_string());
        (style, body)
    }
}

impl PreviewSurface for HeadlessSurface {
    fn load(&mut self, document: &str) -> LoadStatus {
        let (style, body) = Self::split_document(document);
        self.document = document.to_string();
        self.style = style;
        self.body = body;
        self.scroll = ScrollOffset::default();
        self.loads += 1;
        if self.defer_load {
            LoadStatus::InFlight
        } else {
            LoadStatus::Complete
        }
    }

    fn scroll_offset(&self) -> ScrollOffset {
        self.scroll
    }

    fn scroll_to(&mut self, offset: ScrollOffset) {
        let max_y = (self.content_height() - self.viewport_height).max(0.0);
        self.scroll = ScrollOffset {
            x: offset.x.max(0.0),
            y: offset.y.clamp(0.0, max_y),
        };
    }

    fn set_dynamic_style(&mut self, css: &str) {
        self.style = css.to_string();
    }

    fn set_body(&mut self, html: &str) {
        self.body = html.to_string();
    }

    fn highlight_all(&mut self) {
        self.highlight_passes += 1;
    }
}
