//! Grammars and where they come from
//!
//! A [`Grammar`] is a syntect syntax definition paired with the set it was
//! compiled in. Grammars become resident in a [`GrammarRegistry`] once
//! loaded; [`GrammarSource`] implementations provide them on demand.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use syntect::parsing::{SyntaxDefinition, SyntaxReference, SyntaxSet, SyntaxSetBuilder};
use thiserror::Error;
use url::Url;

/// Grammar id used when a fence has no usable language
pub const PLAINTEXT: &str = "plaintext";

static PLAIN_SET: Lazy<Arc<SyntaxSet>> = Lazy::new(|| {
    let mut builder = SyntaxSetBuilder::new();
    builder.add_plain_text_syntax();
    Arc::new(builder.build())
});

/// Grammar loading errors
#[derive(Error, Debug)]
pub enum GrammarError {
    /// No source knows this grammar id
    #[error("No grammar available for {0}")]
    Unavailable(String),

    /// The download URL could not be built
    #[error("Invalid grammar URL: {0}")]
    InvalidUrl(String),

    /// Grammar server answered with a non-success status
    #[error("Grammar {id} download failed with status {status}")]
    Status { id: String, status: u16 },

    /// Transport failure while downloading a grammar
    #[error("Could not download grammar {id}")]
    Fetch {
        id: String,
        #[source]
        source: reqwest::Error,
    },

    /// Downloaded grammar did not parse
    #[error("Grammar {id} is malformed: {message}")]
    Parse { id: String, message: String },
}

/// A compiled grammar for one language id
#[derive(Debug, Clone)]
pub struct Grammar {
    id: String,
    syntaxes: Arc<SyntaxSet>,
    syntax_name: String,
}

impl Grammar {
    fn new(id: &str, syntaxes: Arc<SyntaxSet>, syntax_name: String) -> Self {
        Self {
            id: id.to_string(),
            syntaxes,
            syntax_name,
        }
    }

    /// The always-available grammar that produces no typed tokens
    pub fn plaintext() -> Self {
        Self::new(PLAINTEXT, PLAIN_SET.clone(), "Plain Text".to_string())
    }

    /// Compile a `.sublime-syntax` document into a grammar
    pub fn from_sublime_syntax(id: &str, yaml: &str) -> Result<Self, GrammarError> {
        let definition =
            SyntaxDefinition::load_from_str(yaml, true, Some(id)).map_err(|e| {
                GrammarError::Parse {
                    id: id.to_string(),
                    message: e.to_string(),
                }
            })?;
        let name = definition.name.clone();

        let mut builder = SyntaxSetBuilder::new();
        builder.add_plain_text_syntax();
        builder.add(definition);
        Ok(Self::new(id, Arc::new(builder.build()), name))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn syntax_set(&self) -> &SyntaxSet {
        &self.syntaxes
    }

    pub fn syntax(&self) -> &SyntaxReference {
        self.syntaxes
            .find_syntax_by_name(&self.syntax_name)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    pub fn is_plaintext(&self) -> bool {
        self.id == PLAINTEXT
    }
}

/// Grammars that are loaded and usable
#[derive(Debug, Clone)]
pub struct GrammarRegistry {
    resident: Arc<RwLock<HashMap<String, Arc<Grammar>>>>,
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRegistry {
    /// A registry holding only the plaintext grammar
    pub fn new() -> Self {
        let mut resident = HashMap::new();
        resident.insert(PLAINTEXT.to_string(), Arc::new(Grammar::plaintext()));
        Self {
            resident: Arc::new(RwLock::new(resident)),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Grammar>> {
        let resident = self.resident.read().unwrap_or_else(|e| e.into_inner());
        resident.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        let resident = self.resident.read().unwrap_or_else(|e| e.into_inner());
        resident.contains_key(id)
    }

    /// Make a grammar resident under its id
    pub fn insert(&self, grammar: Grammar) -> Arc<Grammar> {
        let grammar = Arc::new(grammar);
        let mut resident = self.resident.write().unwrap_or_else(|e| e.into_inner());
        resident.insert(grammar.id().to_string(), grammar.clone());
        grammar
    }

    pub fn ids(&self) -> Vec<String> {
        let resident = self.resident.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = resident.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Something that can produce a grammar by id
#[async_trait]
pub trait GrammarSource: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Grammar, GrammarError>;
}

/// Grammars compiled into the binary (syntect's default set)
#[derive(Debug, Clone)]
pub struct BundledGrammarSource {
    syntaxes: Arc<SyntaxSet>,
}

impl Default for BundledGrammarSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BundledGrammarSource {
    pub fn new() -> Self {
        Self {
            syntaxes: Arc::new(SyntaxSet::load_defaults_newlines()),
        }
    }

    /// Find a bundled grammar by id, token, syntax name or file extension
    pub fn lookup(&self, id: &str) -> Option<Grammar> {
        if id == PLAINTEXT {
            return Some(Grammar::plaintext());
        }

        let token = match id {
            "markup" => "html",
            "csharp" => "cs",
            "objectivec" => "objective-c",
            other => other,
        };

        let syntax = self
            .syntaxes
            .find_syntax_by_token(token)
            .or_else(|| {
                self.syntaxes
                    .syntaxes()
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(token))
            })
            .or_else(|| self.syntaxes.find_syntax_by_extension(token))?;

        Some(Grammar::new(id, self.syntaxes.clone(), syntax.name.clone()))
    }
}

#[async_trait]
impl GrammarSource for BundledGrammarSource {
    async fn fetch(&self, id: &str) -> Result<Grammar, GrammarError> {
        self.lookup(id)
            .ok_or_else(|| GrammarError::Unavailable(id.to_string()))
    }
}

/// Downloads `<base><id>.sublime-syntax` documents
#[derive(Debug, Clone)]
pub struct HttpGrammarSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpGrammarSource {
    pub fn new(base_url: &str) -> Result<Self, GrammarError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| GrammarError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("md2pdf-studio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| GrammarError::Fetch {
                id: String::new(),
                source,
            })?;
        Ok(Self { client, base })
    }

    pub fn grammar_url(&self, id: &str) -> Result<Url, GrammarError> {
        self.base
            .join(&format!("{}.sublime-syntax", id))
            .map_err(|e| GrammarError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl GrammarSource for HttpGrammarSource {
    async fn fetch(&self, id: &str) -> Result<Grammar, GrammarError> {
        let url = self.grammar_url(id)?;
        log::debug!("Downloading grammar {} from {}", id, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| GrammarError::Fetch {
                id: id.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrammarError::Status {
                id: id.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| GrammarError::Fetch {
            id: id.to_string(),
            source,
        })?;
        Grammar::from_sublime_syntax(id, &text)
    }
}

/// Tries the bundled set first, then a fallback source
pub struct LayeredGrammarSource {
    bundled: BundledGrammarSource,
    fallback: Option<Box<dyn GrammarSource>>,
}

impl LayeredGrammarSource {
    pub fn new(bundled: BundledGrammarSource, fallback: Option<Box<dyn GrammarSource>>) -> Self {
        Self { bundled, fallback }
    }
}

#[async_trait]
impl GrammarSource for LayeredGrammarSource {
    async fn fetch(&self, id: &str) -> Result<Grammar, GrammarError> {
        if let Some(grammar) = self.bundled.lookup(id) {
            return Ok(grammar);
        }
        match &self.fallback {
            Some(source) => source.fetch(id).await,
            None => Err(GrammarError::Unavailable(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    const MINI_SYNTAX: &str = r#"%YAML 1.2
---
name: Mini
file_extensions: [mini]
scope: source.mini
contexts:
  main:
    - match: '\b(let|fn)\b'
      scope: keyword.control.mini
    - match: '\d+'
      scope: constant.numeric.mini
"#;

    #[test]
    fn test_registry_starts_with_plaintext() {
        let registry = GrammarRegistry::new();
        assert!(registry.contains(PLAINTEXT));
        assert!(!registry.contains("javascript"));
        assert_eq!(registry.ids(), vec![PLAINTEXT.to_string()]);
    }

    #[test]
    fn test_bundled_lookup() {
        let bundled = BundledGrammarSource::new();
        let js = bundled.lookup("javascript").unwrap();
        assert_eq!(js.id(), "javascript");
        assert_eq!(js.syntax().name, "JavaScript");
        assert!(bundled.lookup("markup").is_some());
        assert!(bundled.lookup("rust").is_some());
        assert!(bundled.lookup("definitely-not-a-language").is_none());
    }

    #[test]
    fn test_compile_sublime_syntax() {
        let grammar = Grammar::from_sublime_syntax("mini", MINI_SYNTAX).unwrap();
        assert_eq!(grammar.syntax().name, "Mini");
        assert!(Grammar::from_sublime_syntax("broken", "not: [valid").is_err());
    }

    #[tokio::test]
    async fn test_http_source_downloads_grammar() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/grammars/mini.sublime-syntax");
            then.status(200).body(MINI_SYNTAX);
        });

        let source = HttpGrammarSource::new(&server.url("/grammars")).unwrap();
        let grammar = source.fetch("mini").await.unwrap();
        mock.assert();
        assert_eq!(grammar.id(), "mini");
    }

    #[tokio::test]
    async fn test_http_source_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/missing.sublime-syntax");
            then.status(404);
        });

        let source = HttpGrammarSource::new(&server.base_url()).unwrap();
        let err = source.fetch("missing").await.unwrap_err();
        assert!(matches!(err, GrammarError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_layered_source_prefers_bundled() {
        let source = LayeredGrammarSource::new(BundledGrammarSource::new(), None);
        assert!(source.fetch("python").await.is_ok());
        assert!(matches!(
            source.fetch("nope").await,
            Err(GrammarError::Unavailable(_))
        ));
    }
}
