//! Headless editing session
//!
//! This is the central hub of the application. It owns the text buffer and
//! wires it to the decorator, the preview renderer, the style store and the
//! render API. Every buffer change redecorates and re-renders synchronously;
//! grammars that become resident later trigger one debounced re-scan per
//! burst.

use crate::config::Config;
use crate::editor::{HighlightMark, MarkLayer, TextBuffer, TokenDecorator};
use crate::error::{AppError, AppResult};
use crate::error::ImportError;
use crate::file_handler::{markdown_url_from_location, read_markdown_file, RemoteImporter};
use crate::markdown::css::css_override;
use crate::markdown::export::{Artifact, RenderJobClient, RenderPayload};
use crate::markdown::grammar::{
    BundledGrammarSource, GrammarRegistry, GrammarSource, HttpGrammarSource,
    LayeredGrammarSource,
};
use crate::markdown::preview::{HeadlessSurface, PreviewRenderer, PreviewSurface, SyntaxHighlighter};
use crate::markdown::resolver::{GrammarEvent, LanguageResolver};
use crate::markdown::style::{BindingId, StyleOptions, StyleStore};
use crate::markdown::syntax::{SyntectTokenizer, Tokenizer};
use crate::message::{EditorMessage, InternalMessage, Message, StyleMessage};
use crate::utils::Debouncer;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

/// What an update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing visible changed
    Idle,
    /// Decorations and preview were rebuilt
    Refreshed,
    /// Only the preview was re-rendered
    Rendered,
    /// A style input was registered
    Bound(BindingId),
}

/// Which representation is sent to the render API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Markdown source plus the preview stylesheet
    #[default]
    Source,
    /// The last preview host document as rendered
    Snapshot,
}

/// md2pdf studio session
pub struct App<S: PreviewSurface = HeadlessSurface> {
    /// User configuration
    config: Config,
    buffer: TextBuffer,
    resolver: LanguageResolver,
    decorator: TokenDecorator<MarkLayer>,
    renderer: PreviewRenderer<S>,
    style: StyleStore,
    grammar_events: broadcast::Receiver<GrammarEvent>,
    rescan: Debouncer,
    exporter: RenderJobClient,
    importer: RemoteImporter,
}

impl App<HeadlessSurface> {
    /// Create a session rendering into an in-memory surface
    pub fn new(config: Config, style: StyleOptions) -> AppResult<Self> {
        Self::with_surface(config, style, HeadlessSurface::default())
    }
}

impl<S: PreviewSurface> App<S> {
    /// Create a session rendering into `surface`
    pub fn with_surface(config: Config, style: StyleOptions, surface: S) -> AppResult<Self> {
        config.validate()?;

        let bundled = BundledGrammarSource::new();
        let fallback = match &config.highlight.grammar_base_url {
            Some(url) => Some(Box::new(HttpGrammarSource::new(url)?) as Box<dyn GrammarSource>),
            None => None,
        };
        let source = Arc::new(LayeredGrammarSource::new(bundled.clone(), fallback));
        let resolver = LanguageResolver::new(GrammarRegistry::new(), source);
        resolver.preload(&bundled, &config.highlight.preload);

        let tokenizer: Arc<dyn Tokenizer> = Arc::new(SyntectTokenizer::new());
        let decorator = TokenDecorator::new(MarkLayer::new(), resolver.clone(), tokenizer.clone());
        let highlighter = SyntaxHighlighter::new(resolver.clone(), tokenizer);
        let renderer = PreviewRenderer::new(surface, Box::new(highlighter), config.preview.clone());

        let exporter = RenderJobClient::from_config(&config.export)?;
        let importer = RemoteImporter::new(config.import.strict_urls)?;

        log::info!(
            "Session ready with {} resident grammars, render API at {}",
            resolver.registry().ids().len(),
            config.export.api_base
        );

        Ok(Self {
            grammar_events: resolver.subscribe(),
            rescan: Debouncer::new(config.highlight.rescan_debounce_ms),
            config,
            buffer: TextBuffer::new(),
            resolver,
            decorator,
            renderer,
            style: StyleStore::new(style),
            exporter,
            importer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn resolver(&self) -> &LanguageResolver {
        &self.resolver
    }

    pub fn decorator(&self) -> &TokenDecorator<MarkLayer> {
        &self.decorator
    }

    pub fn renderer(&self) -> &PreviewRenderer<S> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut PreviewRenderer<S> {
        &mut self.renderer
    }

    pub fn style(&self) -> &StyleStore {
        &self.style
    }

    /// Live editor marks, ordered by position
    pub fn marks(&self) -> Vec<HighlightMark> {
        self.decorator.target().marks()
    }

    /// Most recent preview host document
    pub fn preview_document(&self) -> &str {
        self.renderer.last_document()
    }

    /// Handle a message
    pub fn update(&mut self, message: Message) -> AppResult<Effect> {
        match message {
            Message::Editor(msg) => Ok(self.handle_editor_message(msg)),
            Message::Style(msg) => self.handle_style_message(msg),
            Message::Internal(msg) => Ok(self.handle_internal_message(msg)),
            Message::None => Ok(Effect::Idle),
        }
    }

    fn handle_editor_message(&mut self, msg: EditorMessage) -> Effect {
        match msg {
            EditorMessage::SetText(text) => self.buffer.set_content(&text),
            EditorMessage::Insert { line, col, text } => self.buffer.insert_at(line, col, &text),
            EditorMessage::Changed => {}
        }
        self.refresh();
        Effect::Refreshed
    }

    fn handle_style_message(&mut self, msg: StyleMessage) -> AppResult<Effect> {
        match msg {
            StyleMessage::Bind { name, kind } => Ok(Effect::Bound(self.style.bind(&name, kind)?)),
            StyleMessage::Input { binding, raw } => {
                self.style.input(binding, &raw)?;
                self.render_preview();
                Ok(Effect::Rendered)
            }
        }
    }

    fn handle_internal_message(&mut self, msg: InternalMessage) -> Effect {
        match msg {
            InternalMessage::GrammarResident(id) => {
                log::debug!("Grammar {} resident, scheduling re-scan", id);
                self.rescan.trigger();
                Effect::Idle
            }
            InternalMessage::GrammarFailed(id) => {
                log::warn!("Grammar {} unavailable, staying on plaintext", id);
                Effect::Idle
            }
            InternalMessage::SurfaceLoaded => {
                self.renderer.surface_loaded();
                Effect::Rendered
            }
        }
    }

    /// Redecorate the buffer, then re-render the preview
    fn refresh(&mut self) {
        self.decorator.redecorate(&self.buffer);
        self.render_preview();
    }

    fn render_preview(&mut self) {
        let source = self.buffer.text();
        self.renderer.render(&source, self.style.options());
    }

    /// Drain grammar events; redecorates once per burst after the quiet
    /// period. Returns whether a re-scan ran.
    pub fn pump_grammar_events(&mut self) -> bool {
        loop {
            let message = match self.grammar_events.try_recv() {
                Ok(GrammarEvent::Resident(id)) => InternalMessage::GrammarResident(id),
                Ok(GrammarEvent::Failed(id)) => InternalMessage::GrammarFailed(id),
                Err(TryRecvError::Lagged(missed)) => {
                    log::debug!("Missed {} grammar events", missed);
                    InternalMessage::GrammarResident(String::new())
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            };
            self.handle_internal_message(message);
        }

        if self.rescan.poll_due() {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Wait until no grammar loads or re-scans are outstanding
    pub async fn settle(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut rescans = 0;
        loop {
            // Loads are sampled before draining: a resident event is queued
            // before its load leaves the pending table.
            let loads_done = self.resolver.pending_loads() == 0;
            if self.pump_grammar_events() {
                rescans += 1;
            }
            let idle = loads_done && !self.rescan.is_pending();
            if idle || Instant::now() >= deadline {
                return rescans;
            }
            let wait = self
                .rescan
                .remaining()
                .unwrap_or(Duration::from_millis(10))
                .max(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }

    /// Build the request body for an export
    pub fn export_payload(&mut self, mode: ExportMode) -> RenderPayload {
        match mode {
            ExportMode::Source => RenderPayload::markdown(self.buffer.text())
                .with_css_override(css_override(self.style.options()))
                .with_base_url(self.config.export.static_base()),
            ExportMode::Snapshot => {
                if self.renderer.last_document().is_empty() {
                    self.render_preview();
                }
                RenderPayload::html(self.renderer.last_document())
            }
        }
    }

    /// Render the current document to PDF through the render API
    pub async fn export_pdf(
        &mut self,
        mode: ExportMode,
        cancel: &CancellationToken,
    ) -> AppResult<Artifact> {
        let payload = self.export_payload(mode);
        log::debug!("Exporting PDF ({:?} mode)", mode);
        self.exporter
            .submit_with_cancel(&payload, cancel)
            .await
            .map_err(|e| {
                log::error!("PDF export failed: {}", e);
                AppError::from(e)
            })
    }

    /// Replace the buffer with a local file; the buffer is untouched on error
    pub async fn import_file(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let result = read_markdown_file(path, self.config.import.max_file_size)
            .await
            .map_err(|e| {
                log::error!("Import of {} failed: {}", path.display(), e);
                AppError::from(e)
            })?;
        self.load_content(result.content);
        Ok(())
    }

    /// Replace the buffer with a remote document; the buffer is untouched on
    /// error
    pub async fn import_url(&mut self, url: &str) -> AppResult<()> {
        let text = self.importer.fetch(url).await.map_err(|e| {
            log::error!("Import of {} failed: {}", url, e);
            AppError::from(e)
        })?;
        self.load_content(text);
        Ok(())
    }

    /// Import the document named by a page location's `url` parameter
    pub async fn import_location(&mut self, location: &str) -> AppResult<()> {
        let url = markdown_url_from_location(location).ok_or_else(|| {
            log::error!("No document URL in {}", location);
            ImportError::DisallowedUrl {
                url: location.to_string(),
            }
        })?;
        log::info!("Loading {} from location", url);
        self.import_url(&url).await
    }

    fn load_content(&mut self, text: String) {
        if text.is_empty() {
            log::debug!("Imported document is empty, keeping buffer");
            return;
        }
        self.handle_editor_message(EditorMessage::SetText(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::LANG_CLASS;
    use crate::error::StyleError;
    use crate::markdown::style::InputKind;
    use httpmock::MockServer;
    use serde_json::json;
    use std::io::Write;

    const DOC: &str = "# Title\n\n```rust\nfn main() {}\n```\n";

    fn config(api_base: &str) -> Config {
        let mut config = Config::default();
        config.export.api_base = api_base.to_string();
        config.export.poll_interval_ms = 10;
        config.export.timeout_ms = 1_000;
        config.highlight.rescan_debounce_ms = 0;
        config
    }

    fn app() -> App {
        App::new(config("http://localhost:8000"), StyleOptions::default()).unwrap()
    }

    fn set_text(app: &mut App, text: &str) {
        app.update(Message::Editor(EditorMessage::SetText(text.to_string())))
            .unwrap();
    }

    #[test]
    fn test_change_redecorates_and_renders() {
        let mut app = app();
        set_text(&mut app, DOC);

        let marks = app.marks();
        assert!(marks.contains(&HighlightMark::new(2, 3, 7, LANG_CLASS)));
        assert!(marks.iter().any(|m| m.line == 3 && m.class != LANG_CLASS));
        assert!(app.preview_document().contains("language-rust"));
        assert!(app.renderer().surface().body().contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_end_to_end_preview_and_invalid_color() {
        let mut app = app();
        set_text(&mut app, "# Title\n\n```js\nconsole.log(1)\n```\n");

        let document = app.preview_document().to_string();
        assert!(document.contains("<h1>Title</h1>"));
        assert!(document.contains("<pre class=\"language-javascript\">"));
        assert!(document.contains("<span class=\"token "));

        let before = app.style().options().code_color.clone();
        let binding = match app
            .update(Message::Style(StyleMessage::Bind {
                name: "codeColor".to_string(),
                kind: InputKind::Color,
            }))
            .unwrap()
        {
            Effect::Bound(id) => id,
            other => panic!("unexpected effect {:?}", other),
        };
        assert!(app
            .update(Message::Style(StyleMessage::Input {
                binding,
                raw: "#ZZZ".to_string(),
            }))
            .is_err());
        assert_eq!(app.style().options().code_color, before);
    }

    #[test]
    fn test_insert_updates_views() {
        let mut app = app();
        set_text(&mut app, "intro\n");
        assert!(app.marks().is_empty());

        app.update(Message::Editor(EditorMessage::Insert {
            line: 1,
            col: 0,
            text: "```js\nlet a = 1;\n```\n".to_string(),
        }))
        .unwrap();
        assert_eq!(app.decorator().regions().len(), 1);
        assert!(app.renderer().surface().body().contains("language-javascript"));
    }

    #[test]
    fn test_style_input_rerenders_preview() {
        let mut app = app();
        set_text(&mut app, DOC);
        let binding = match app
            .update(Message::Style(StyleMessage::Bind {
                name: "codeColor".to_string(),
                kind: InputKind::ColorHex,
            }))
            .unwrap()
        {
            Effect::Bound(id) => id,
            other => panic!("unexpected effect {:?}", other),
        };

        let effect = app
            .update(Message::Style(StyleMessage::Input {
                binding,
                raw: "#0a0".to_string(),
            }))
            .unwrap();
        assert_eq!(effect, Effect::Rendered);
        assert!(app.renderer().surface().style().contains("#00AA00"));

        let revision = app.style().revision();
        let err = app
            .update(Message::Style(StyleMessage::Input {
                binding,
                raw: "#ZZZ".to_string(),
            }))
            .unwrap_err();
        assert!(matches!(err, AppError::Style(StyleError::InvalidColor { .. })));
        assert_eq!(app.style().revision(), revision);
        assert_eq!(app.style().options().code_color, "#00AA00");
        assert!(app.renderer().surface().style().contains("#00AA00"));
    }

    #[test]
    fn test_source_payload() {
        let mut app = app();
        set_text(&mut app, DOC);
        let payload = app.export_payload(ExportMode::Source);

        assert_eq!(payload.md.as_deref(), Some(DOC));
        assert_eq!(payload.base_url.as_deref(), Some("http://localhost:8000/static/"));
        assert!(payload.css_override.unwrap().contains(".token.keyword"));
        assert!(payload.html.is_none());
    }

    #[test]
    fn test_snapshot_payload_uses_last_document() {
        let mut app = app();
        set_text(&mut app, DOC);
        let payload = app.export_payload(ExportMode::Snapshot);
        assert_eq!(payload.html.as_deref(), Some(app.preview_document()));
        assert!(payload.md.is_none());
    }

    #[tokio::test]
    async fn test_grammar_load_rehighlights_fence() {
        let mut app = app();
        set_text(&mut app, "```go\npackage main\n```\n");
        let passes = app.decorator().passes();
        assert!(app.marks().iter().all(|m| m.line != 1));

        let rescans = app.settle(Duration::from_secs(5)).await;

        assert_eq!(rescans, 1);
        assert_eq!(app.decorator().passes(), passes + 1);
        assert_eq!(app.decorator().regions()[0].grammar_id.as_deref(), Some("go"));
        assert!(app
            .marks()
            .iter()
            .any(|m| m.line == 1 && m.class != LANG_CLASS));
        assert!(app.resolver().registry().contains("go"));
        assert!(!app.pump_grammar_events());
    }

    #[tokio::test]
    async fn test_editor_and_preview_agree_on_grammar() {
        let mut app = app();
        set_text(&mut app, "```c++\nint x = 1;\n```\n\n```zzz\nplain\n```\n");
        app.settle(Duration::from_secs(5)).await;

        let regions = app.decorator().regions();
        assert_eq!(regions[0].tag.as_ref().map(|t| t.text.as_str()), Some("c++"));
        assert_eq!(regions[0].grammar_id.as_deref(), Some("cpp"));
        assert_eq!(regions[1].grammar_id.as_deref(), Some("plaintext"));

        let body = app.renderer().surface().body();
        assert!(body.contains("<pre class=\"language-cpp\">"));
        assert!(body.contains("<pre class=\"language-plaintext\">"));
        assert!(!body.contains("language-zzz"));
    }

    #[test]
    fn test_burst_of_resident_events_rescans_once() {
        let mut app = app();
        set_text(&mut app, DOC);
        let passes = app.decorator().passes();

        for id in ["go", "ruby", "python"] {
            app.update(Message::Internal(InternalMessage::GrammarResident(id.to_string())))
                .unwrap();
        }

        assert!(app.pump_grammar_events());
        assert!(!app.pump_grammar_events());
        assert_eq!(app.decorator().passes(), passes + 1);
    }

    #[tokio::test]
    async fn test_export_pdf_source_mode() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/api/v1/md-to-pdf")
                .json_body_includes(json!({ "md": DOC }).to_string());
            then.status(200)
                .header("content-type", "application/pdf")
                .body("%PDF-1.7");
        });

        let mut app = App::new(config(&server.base_url()), StyleOptions::default()).unwrap();
        set_text(&mut app, DOC);
        let artifact = app
            .export_pdf(ExportMode::Source, &CancellationToken::new())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(artifact.bytes.as_ref(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_import_file_replaces_buffer() {
        let mut app = app();
        set_text(&mut app, "old");

        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        app.import_file(file.path()).await.unwrap();
        assert_eq!(app.buffer().text(), DOC);
        assert_eq!(app.decorator().regions().len(), 1);

        let png = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        assert!(app.import_file(png.path()).await.is_err());
        assert_eq!(app.buffer().text(), DOC);
    }

    #[tokio::test]
    async fn test_failed_url_import_keeps_buffer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/gone.md");
            then.status(500).body("boom");
        });

        let mut app = app();
        set_text(&mut app, "keep me");
        let err = app.import_url(&server.url("/gone.md")).await.unwrap_err();

        mock.assert();
        assert!(matches!(err, AppError::Import(_)));
        assert_eq!(app.buffer().text(), "keep me");
    }

    #[tokio::test]
    async fn test_import_location_follows_url_parameter() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/docs/guide.md");
            then.status(200).body("# Guide\n");
        });

        let mut app = app();
        let doc_url = server.url("/docs/guide.md");
        let location = format!("https://studio.example/#/?url={}", doc_url);
        app.import_location(&location).await.unwrap();

        mock.assert();
        assert_eq!(app.buffer().text(), "# Guide\n");

        let err = app
            .import_location("https://studio.example/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Import(ImportError::DisallowedUrl { .. })));
        assert_eq!(app.buffer().text(), "# Guide\n");
    }
}
