//! Static policy checks over normalized script source.
//!
//! Three independent passes: imported symbols against an allow-list,
//! forbidden-word containment, and reachability of single-quoted URLs.
//! A violating script is a normal result here, never an error.

use crate::probe::ReachabilityProbe;
use crate::util::remove_substrings;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// A word the generated script must not use, with its sanctioned stand-in.
#[derive(Debug, Clone, Deserialize)]
pub struct ForbiddenWord {
    pub forbidden: String,
    pub replacement: String,
}

/// Validation policy for generated scripts. Read-only for the engine.
///
/// The order of `forbidden_words` is significant: matched words are paired
/// with replacements positionally when composing a correction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub allowed_imports: Vec<String>,
    #[serde(default)]
    pub forbidden_words: Vec<ForbiddenWord>,
}

/// Outcome of one validation pass over a script.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub disallowed_imports: Vec<String>,
    pub forbidden_hits: Vec<String>,
    pub unreachable_resources: Vec<String>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.disallowed_imports.is_empty()
            && self.forbidden_hits.is_empty()
            && self.unreachable_resources.is_empty()
    }
}

/// Symbols imported at the top of the script.
///
/// Statements are `;`-separated segments whose first six characters are
/// `import`; scanning stops at the first non-import segment, since generated
/// scripts put imports first. Symbol names are the text between `import` and
/// `from` (or the segment end), with wildcard, alias, brace, and space
/// characters removed, split on commas.
pub fn imported_symbols(source: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    for segment in source.split(';') {
        let statement = segment.trim();
        if !statement.starts_with("import") {
            break;
        }
        let clause = &statement["import".len()..];
        let clause = match clause.find("from") {
            Some(pos) => &clause[..pos],
            None => clause,
        };
        let cleaned = remove_substrings(clause, &["*", " as ", "{", "}", " "]);
        symbols.extend(
            cleaned
                .split(',')
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
    }
    symbols
}

/// Imported symbols missing from the allow-list, in first-seen order.
/// Duplicates are all reported.
pub fn disallowed_imports(source: &str, allowed: &[String]) -> Vec<String> {
    imported_symbols(source)
        .into_iter()
        .filter(|symbol| !allowed.iter().any(|a| a == symbol))
        .collect()
}

/// Forbidden words contained in the source, in policy-list order.
pub fn forbidden_hits(source: &str, words: &[ForbiddenWord]) -> Vec<String> {
    words
        .iter()
        .filter(|word| source.contains(word.forbidden.as_str()))
        .map(|word| word.forbidden.clone())
        .collect()
}

/// Single-quoted `http://` / `https://` URLs referenced by the source.
pub fn quoted_urls(source: &str) -> Vec<String> {
    let re = Regex::new(r"'(https?://[\w/:%#$&?()~.=+-]+)'")
        .unwrap_or_else(|_| Regex::new("$^").unwrap());
    re.captures_iter(source)
        .filter_map(|captures| captures.get(1))
        .map(|url| url.as_str().to_string())
        .collect()
}

/// Runs the three policy passes, probing each referenced URL.
pub struct PolicyChecker<'a, P: ReachabilityProbe> {
    policy: &'a Policy,
    probe: &'a P,
}

impl<'a, P: ReachabilityProbe> PolicyChecker<'a, P> {
    pub fn new(policy: &'a Policy, probe: &'a P) -> Self {
        Self { policy, probe }
    }

    /// Validate normalized source. URLs are probed one at a time.
    pub async fn check(&self, source: &str) -> ValidationResult {
        let disallowed = disallowed_imports(source, &self.policy.allowed_imports);
        let hits = forbidden_hits(source, &self.policy.forbidden_words);
        let mut unreachable = Vec::new();
        for url in quoted_urls(source) {
            if !self.is_reachable(&url).await {
                unreachable.push(url);
            }
        }
        ValidationResult {
            disallowed_imports: disallowed,
            forbidden_hits: hits,
            unreachable_resources: unreachable,
        }
    }

    /// A URL counts as reachable only on a 2xx probe response. Transport
    /// failures are folded into "unreachable" rather than surfaced.
    async fn is_reachable(&self, url: &str) -> bool {
        match self.probe.probe(url).await {
            Ok(status) => (200..300).contains(&status),
            Err(err) => {
                debug!(%url, %err, "reachability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        disallowed_imports, forbidden_hits, imported_symbols, quoted_urls, ForbiddenWord, Policy,
        PolicyChecker,
    };
    use crate::probe::{ProbeError, ReachabilityProbe};
    use async_trait::async_trait;

    fn words(pairs: &[(&str, &str)]) -> Vec<ForbiddenWord> {
        pairs
            .iter()
            .map(|(forbidden, replacement)| ForbiddenWord {
                forbidden: forbidden.to_string(),
                replacement: replacement.to_string(),
            })
            .collect()
    }

    struct StaticProbe {
        status: Option<u16>,
    }

    #[async_trait]
    impl ReachabilityProbe for StaticProbe {
        async fn probe(&self, _url: &str) -> Result<u16, ProbeError> {
            self.status
                .ok_or_else(|| ProbeError("connection refused".to_string()))
        }
    }

    #[test]
    fn named_imports_are_split_on_commas() {
        let symbols = imported_symbols("import {a,b} from 'mod';const x = 1;");
        assert_eq!(symbols, vec!["a", "b"]);
    }

    #[test]
    fn wildcard_and_alias_syntax_is_stripped() {
        let symbols = imported_symbols("import * as THREE from 'three';");
        assert_eq!(symbols, vec!["THREE"]);
    }

    #[test]
    fn scan_stops_at_first_non_import_segment() {
        let source = "import {a} from 'x';const y = 2;import {late} from 'z';";
        assert_eq!(imported_symbols(source), vec!["a"]);
    }

    #[test]
    fn disallowed_imports_keep_first_seen_order() {
        let allowed = vec!["a".to_string()];
        let found = disallowed_imports("import {a,b} from 'mod';", &allowed);
        assert_eq!(found, vec!["b"]);
    }

    #[test]
    fn duplicate_disallowed_imports_are_all_reported() {
        // The filter is a plain retain pass, so repeats survive.
        let allowed = vec!["a".to_string()];
        let found = disallowed_imports("import {b,b,a} from 'mod';", &allowed);
        assert_eq!(found, vec!["b", "b"]);
    }

    #[test]
    fn forbidden_hits_follow_policy_order() {
        let list = words(&[("TextureLoader", "MeshBasicMaterial"), ("fetch", "none")]);
        let hits = forbidden_hits("fetch(x); new THREE.TextureLoader();", &list);
        assert_eq!(hits, vec!["TextureLoader", "fetch"]);
    }

    #[test]
    fn quoted_urls_match_single_quoted_http_strings() {
        let source =
            "load('https://example.com/wood.png'); const s = \"https://ignored.example\"; fetch('http://a.example/x?y=1');";
        let urls = quoted_urls(source);
        assert_eq!(
            urls,
            vec!["https://example.com/wood.png", "http://a.example/x?y=1"]
        );
    }

    #[tokio::test]
    async fn check_folds_probe_failures_into_unreachable() {
        let policy = Policy {
            allowed_imports: vec!["THREE".to_string()],
            forbidden_words: words(&[("fetch", "none")]),
        };
        let probe = StaticProbe { status: None };
        let checker = PolicyChecker::new(&policy, &probe);
        let source = "import * as THREE from 'three';load('https://example.com/a.png');";
        let result = checker.check(source).await;
        assert!(result.disallowed_imports.is_empty());
        assert!(result.forbidden_hits.is_empty());
        assert_eq!(result.unreachable_resources, vec!["https://example.com/a.png"]);
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn check_treats_non_2xx_status_as_unreachable() {
        let policy = Policy {
            allowed_imports: vec![],
            forbidden_words: vec![],
        };
        let probe = StaticProbe { status: Some(404) };
        let checker = PolicyChecker::new(&policy, &probe);
        let result = checker.check("load('https://example.com/gone.png');").await;
        assert_eq!(result.unreachable_resources.len(), 1);

        let probe = StaticProbe { status: Some(204) };
        let checker = PolicyChecker::new(&policy, &probe);
        let result = checker.check("load('https://example.com/ok.png');").await;
        assert!(result.is_clean());
    }
}
