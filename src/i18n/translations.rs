//! JIT Translation Registry
//!
//! Stores only metadata per flag/command (canonical name, command path,
//! translation key). Direction maps (canonical→translated and back) exist
//! only for the currently active language and are rebuilt lazily: on first
//! lookup, after a language switch, or after a registration. Lookups take
//! the read lock; a rebuild takes the write lock once per invalidation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::i18n::catalog::MessageCatalog;
use crate::i18n::LangTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Flag,
    Command,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: SymbolKind,
    canonical: String,
    #[allow(dead_code)]
    path: String,
    key: String,
}

#[derive(Debug, Default)]
struct Cache {
    lang: Option<LangTag>,
    generation: u64,
    flag_to_translated: HashMap<String, String>,
    flag_to_canonical: HashMap<String, String>,
    command_to_translated: HashMap<String, String>,
    command_to_canonical: HashMap<String, String>,
}

/// Per-language name translation with a generation-stamped cache.
#[derive(Debug, Default)]
pub struct TranslationRegistry {
    entries: Vec<Entry>,
    generation: u64,
    cache: RwLock<Cache>,
}

impl TranslationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a symbol's translation key. Invalidates the cache.
    pub fn register(
        &mut self,
        kind: SymbolKind,
        canonical: impl Into<String>,
        path: impl Into<String>,
        key: impl Into<String>,
    ) {
        self.entries.push(Entry {
            kind,
            canonical: canonical.into(),
            path: path.into(),
            key: key.into(),
        });
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_cache(&self, catalog: &MessageCatalog, lang: &LangTag) {
        {
            let cache = self.cache.read().expect("translation cache poisoned");
            if cache.generation == self.generation && cache.lang.as_ref() == Some(lang) {
                return;
            }
        }
        let mut rebuilt = Cache {
            lang: Some(lang.clone()),
            generation: self.generation,
            ..Cache::default()
        };
        for entry in &self.entries {
            let Some(translated) = catalog.lookup(lang, &entry.key) else {
                continue;
            };
            let translated = translated.to_string();
            match entry.kind {
                SymbolKind::Flag => {
                    // A canonical registered under several contexts keeps one
                    // arbitrary variant; the engine re-qualifies with the
                    // current command context downstream.
                    rebuilt
                        .flag_to_translated
                        .insert(entry.canonical.clone(), translated.clone());
                    rebuilt
                        .flag_to_canonical
                        .insert(translated, entry.canonical.clone());
                }
                SymbolKind::Command => {
                    rebuilt
                        .command_to_translated
                        .insert(entry.canonical.clone(), translated.clone());
                    rebuilt
                        .command_to_canonical
                        .insert(translated, entry.canonical.clone());
                }
            }
        }
        *self.cache.write().expect("translation cache poisoned") = rebuilt;
    }

    /// Canonical flag name for a translated input, in `lang`.
    pub fn flag_canonical(
        &self,
        catalog: &MessageCatalog,
        lang: &LangTag,
        translated: &str,
    ) -> Option<String> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache.flag_to_canonical.get(translated).cloned()
    }

    /// Translated flag name for a canonical input, in `lang`.
    pub fn flag_translated(
        &self,
        catalog: &MessageCatalog,
        lang: &LangTag,
        canonical: &str,
    ) -> Option<String> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache.flag_to_translated.get(canonical).cloned()
    }

    pub fn command_canonical(
        &self,
        catalog: &MessageCatalog,
        lang: &LangTag,
        translated: &str,
    ) -> Option<String> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache.command_to_canonical.get(translated).cloned()
    }

    pub fn command_translated(
        &self,
        catalog: &MessageCatalog,
        lang: &LangTag,
        canonical: &str,
    ) -> Option<String> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache.command_to_translated.get(canonical).cloned()
    }

    /// All `(canonical, translated)` flag pairs for `lang`. Suggestion input.
    pub fn flag_pairs(&self, catalog: &MessageCatalog, lang: &LangTag) -> Vec<(String, String)> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache
            .flag_to_translated
            .iter()
            .map(|(c, t)| (c.clone(), t.clone()))
            .collect()
    }

    /// All `(canonical, translated)` command pairs for `lang`.
    pub fn command_pairs(
        &self,
        catalog: &MessageCatalog,
        lang: &LangTag,
    ) -> Vec<(String, String)> {
        self.ensure_cache(catalog, lang);
        let cache = self.cache.read().expect("translation cache poisoned");
        cache
            .command_to_translated
            .iter()
            .map(|(c, t)| (c.clone(), t.clone()))
            .collect()
    }
}
