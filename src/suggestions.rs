//! "Did You Mean" Suggestions
//!
//! For an unknown flag or command name, candidates are ranked by Levenshtein
//! distance against every registered canonical name and every translated
//! name in the active language. Distance-1 matches suppress anything
//! farther away; at most three suggestions are shown, closest first.

use std::sync::Arc;

/// Renders a selected suggestion list for display. The default produces a
/// comma list in brackets: `[serve, server]`.
pub type SuggestionFormatter = Arc<dyn Fn(&[String]) -> String>;

/// Distance thresholds, configurable per symbol kind. `0` disables
/// suggestions entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionConfig {
    pub flag_threshold: usize,
    pub command_threshold: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            flag_threshold: 2,
            command_threshold: 2,
        }
    }
}

/// A candidate name: the canonical form and, when the active language has
/// one, its translation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub canonical: String,
    pub translated: Option<String>,
}

impl Candidate {
    pub fn plain(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            translated: None,
        }
    }

    pub fn translated(canonical: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            translated: Some(translated.into()),
        }
    }
}

const MAX_SUGGESTIONS: usize = 3;

/// Select and format suggestion display strings for `input`.
///
/// Each candidate scores as the smaller of the distances to its canonical
/// and translated form; the closer form is displayed. A tie between two
/// different forms displays both joined with ` / `.
pub fn suggest(input: &str, candidates: &[Candidate], threshold: usize) -> Vec<String> {
    if threshold == 0 {
        return Vec::new();
    }

    struct Scored {
        distance: usize,
        display: String,
    }

    let mut scored: Vec<Scored> = Vec::new();
    for candidate in candidates {
        let canonical_distance = strsim::levenshtein(input, &candidate.canonical);
        let translated_distance = candidate
            .translated
            .as_ref()
            .map(|t| strsim::levenshtein(input, t));

        let (distance, display) = match (&candidate.translated, translated_distance) {
            (Some(translated), Some(td)) => {
                if td < canonical_distance {
                    (td, translated.clone())
                } else if canonical_distance < td {
                    (canonical_distance, candidate.canonical.clone())
                } else if translated != &candidate.canonical {
                    (
                        canonical_distance,
                        format!("{} / {}", candidate.canonical, translated),
                    )
                } else {
                    (canonical_distance, candidate.canonical.clone())
                }
            }
            _ => (canonical_distance, candidate.canonical.clone()),
        };

        if distance <= threshold {
            scored.push(Scored { distance, display });
        }
    }

    if scored.is_empty() {
        return Vec::new();
    }

    let best = scored.iter().map(|s| s.distance).min().unwrap_or(0);
    // Close matches make the far ones noise.
    if best == 1 {
        scored.retain(|s| s.distance == 1);
    }

    scored.sort_by(|a, b| a.distance.cmp(&b.distance).then(a.display.cmp(&b.display)));
    scored.dedup_by(|a, b| a.display == b.display);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|s| s.display)
        .collect()
}

/// Default presentation: comma list in brackets.
pub fn default_format(suggestions: &[String]) -> String {
    format!("[{}]", suggestions.join(", "))
}
