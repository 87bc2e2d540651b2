//! Localization support
//!
//! This module contains the layered message catalog, the JIT translation
//! registry for flag and command names, and the language auto-detection probe.

pub mod catalog;
pub mod language;
pub mod translations;

use std::fmt;
use std::str::FromStr;

pub use catalog::MessageCatalog;
pub use translations::{SymbolKind, TranslationRegistry};

/// A minimal BCP-47 language tag: base language plus optional script and
/// region subtags. Extension subtags are accepted and discarded, so two tags
/// that differ only in extensions compare equal on [`LangTag::base`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LangTag {
    base: String,
    script: Option<String>,
    region: Option<String>,
}

impl LangTag {
    /// Parse a language tag. Underscores are normalized to hyphens before
    /// parsing (`en_US` and `en-US` are the same tag). Returns `None` for
    /// strings that cannot be a tag at all.
    pub fn parse(input: &str) -> Option<LangTag> {
        let normalized = input.trim().replace('_', "-");
        if normalized.is_empty() {
            return None;
        }
        let mut parts = normalized.split('-');

        let base = parts.next()?;
        if base.len() < 2 || base.len() > 8 || !base.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let base = base.to_ascii_lowercase();

        let mut script = None;
        let mut region = None;
        for part in parts {
            if part.len() == 4 && part.chars().all(|c| c.is_ascii_alphabetic()) {
                if script.is_none() {
                    let mut s = part.to_ascii_lowercase();
                    if let Some(first) = s.get_mut(0..1) {
                        first.make_ascii_uppercase();
                    }
                    script = Some(s);
                }
            } else if (part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
                || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit()))
            {
                if region.is_none() {
                    region = Some(part.to_ascii_uppercase());
                }
            } else {
                // Extension or variant subtag: everything after it is ignored.
                break;
            }
        }

        Some(LangTag { base, script, region })
    }

    /// The base language subtag, lowercased (`"en"` for `en-US`).
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Language equality: two tags match when their base languages match.
    /// Region and script are presentation detail, not identity.
    pub fn matches(&self, other: &LangTag) -> bool {
        self.base == other.base
    }

    /// The default language.
    pub fn english() -> LangTag {
        LangTag {
            base: "en".to_string(),
            script: None,
            region: None,
        }
    }
}

impl fmt::Display for LangTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(script) = &self.script {
            write!(f, "-{}", script)?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{}", region)?;
        }
        Ok(())
    }
}

impl FromStr for LangTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LangTag::parse(s).ok_or(())
    }
}

impl Default for LangTag {
    fn default() -> Self {
        LangTag::english()
    }
}
