//! Language resolution with lazy grammar loading
//!
//! Maps fence tags to grammar ids. Unknown grammars are fetched in the
//! background; until they arrive the caller gets the plaintext grammar. Each
//! pending load is a shared future, so concurrent requests for the same id
//! await one fetch.

use crate::markdown::grammar::{
    BundledGrammarSource, Grammar, GrammarRegistry, GrammarSource, PLAINTEXT,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// A grammar load in flight; resolves to `None` when the fetch failed
pub type GrammarLoad = Shared<BoxFuture<'static, Option<Arc<Grammar>>>>;

const EVENT_CAPACITY: usize = 64;

/// Emitted when a background load finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarEvent {
    Resident(String),
    Failed(String),
}

/// Normalize a free-form fence tag into a grammar id
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let id = match tag.as_str() {
        "" | "txt" | "text" | "plain" | "none" => PLAINTEXT,
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "sh" | "shell" | "zsh" => "bash",
        "html" | "xml" | "svg" => "markup",
        "md" => "markdown",
        "yml" => "yaml",
        "json5" => "json",
        "cplusplus" | "c++" => "cpp",
        "py" => "python",
        "rs" => "rust",
        "cs" => "csharp",
        other => other,
    };

    let usable = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if usable {
        id.to_string()
    } else {
        PLAINTEXT.to_string()
    }
}

/// Outcome of a single resolve call
#[derive(Clone)]
pub struct Resolution {
    /// Grammar usable right now (the requested one or plaintext)
    pub grammar_id: String,
    /// Normalized id that was asked for
    pub requested: String,
    /// Pending load for `requested`, if it is not resident yet
    pub load: Option<GrammarLoad>,
    /// Whether this call started the load
    pub started: bool,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.grammar_id != self.requested
    }
}

/// Resolves language tags against resident grammars
#[derive(Clone)]
pub struct LanguageResolver {
    registry: GrammarRegistry,
    source: Arc<dyn GrammarSource>,
    pending: Arc<Mutex<HashMap<String, GrammarLoad>>>,
    events: broadcast::Sender<GrammarEvent>,
}

impl LanguageResolver {
    pub fn new(registry: GrammarRegistry, source: Arc<dyn GrammarSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry,
            source,
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Receive resident/failed notifications for background loads
    pub fn subscribe(&self) -> broadcast::Receiver<GrammarEvent> {
        self.events.subscribe()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.contains_key(id)
    }

    /// Number of loads still in flight
    pub fn pending_loads(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Make bundled grammars resident without going through the source
    pub fn preload<S: AsRef<str>>(&self, bundled: &BundledGrammarSource, ids: &[S]) {
        for tag in ids {
            let id = normalize_tag(tag.as_ref());
            if self.registry.contains(&id) {
                continue;
            }
            match bundled.lookup(&id) {
                Some(grammar) => {
                    self.registry.insert(grammar);
                    log::debug!("Preloaded grammar {}", id);
                }
                None => log::warn!("No bundled grammar for preload id {}", id),
            }
        }
    }

    /// Resident grammar for an id, or plaintext
    pub fn grammar(&self, id: &str) -> Arc<Grammar> {
        self.registry
            .get(id)
            .or_else(|| self.registry.get(PLAINTEXT))
            .unwrap_or_else(|| Arc::new(Grammar::plaintext()))
    }

    /// Resolve a tag, starting a background load when the grammar is missing
    pub fn resolve(&self, tag: &str) -> Resolution {
        let requested = normalize_tag(tag);
        if self.registry.contains(&requested) {
            return Resolution {
                grammar_id: requested.clone(),
                requested,
                load: None,
                started: false,
            };
        }

        let mut fallback = Resolution {
            grammar_id: PLAINTEXT.to_string(),
            requested: requested.clone(),
            load: None,
            started: false,
        };

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(load) = pending.get(&requested) {
            fallback.load = Some(load.clone());
            return fallback;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("Cannot load grammar {} outside a runtime", requested);
                return fallback;
            }
        };

        log::debug!("Loading grammar {}", requested);
        let task = runtime.spawn(self.fetch_task(requested.clone()));
        let load: GrammarLoad = async move { task.await.ok().flatten() }.boxed().shared();
        pending.insert(requested, load.clone());

        fallback.load = Some(load);
        fallback.started = true;
        fallback
    }

    /// Resolve a tag and call `on_resolved(tag)` once if this call's load succeeds
    pub fn resolve_with<F>(&self, tag: &str, on_resolved: F) -> String
    where
        F: FnOnce(String) + Send + 'static,
    {
        let resolution = self.resolve(tag);
        if let (true, Some(load)) = (resolution.started, resolution.load.clone()) {
            let tag = tag.to_string();
            tokio::spawn(async move {
                if load.await.is_some() {
                    on_resolved(tag);
                }
            });
        }
        resolution.grammar_id
    }

    /// Resolve a tag and wait for any load it needs
    pub async fn load(&self, tag: &str) -> Arc<Grammar> {
        let resolution = self.resolve(tag);
        match resolution.load {
            Some(load) => match load.await {
                Some(grammar) => grammar,
                None => self.grammar(PLAINTEXT),
            },
            None => self.grammar(&resolution.grammar_id),
        }
    }

    fn fetch_task(&self, id: String) -> impl std::future::Future<Output = Option<Arc<Grammar>>> {
        let source = self.source.clone();
        let registry = self.registry.clone();
        let pending = self.pending.clone();
        let events = self.events.clone();

        async move {
            let outcome = match source.fetch(&id).await {
                Ok(grammar) => Some(registry.insert(grammar)),
                Err(err) => {
                    log::warn!("Grammar {} unavailable: {}", id, err);
                    None
                }
            };

            // Resident is sent before the entry goes away; Failed after, so
            // a listener's retry starts a fresh fetch.
            let forget = |id: &str| {
                pending.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
            };
            match outcome {
                Some(_) => {
                    let _ = events.send(GrammarEvent::Resident(id.clone()));
                    forget(&id);
                }
                None => {
                    forget(&id);
                    let _ = events.send(GrammarEvent::Failed(id));
                }
            }
            outcome
        }
    }
}
