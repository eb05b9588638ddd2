//! Pattern Registry (C1): a statically compiled mapping from category to an
//! ordered list of regular expressions plus a solution template family.
//! Grounded on the teacher's `ci_diagnostics::infer_source` keyword
//! classifier, generalized from a flat keyword match to a priority-ordered
//! regex catalogue with capture groups, since the spec requires captured
//! slot values (package name, file path, host, ...) for the Patch
//! Synthesizer (C6) to consume downstream.
//!
//! The registry is process-wide and read-only after construction — built
//! once behind a `OnceLock` and shared via `&'static PatternRegistry`.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Category;

/// One compiled rule: a regex whose match, if any, identifies `category`
/// and whose capture groups feed `solution_family` slot extraction.
pub struct CompiledPattern {
    pub category: Category,
    pub solution_family: &'static str,
    pub regex: Regex,
}

/// A single match produced by [`PatternRegistry::scan`].
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub category: Category,
    pub solution_family: &'static str,
    pub span: (usize, usize),
    pub matched_text: String,
    pub captures: Vec<Option<String>>,
}

pub struct PatternRegistry {
    patterns: Vec<CompiledPattern>,
}

fn rule(category: Category, solution_family: &'static str, pattern: &str) -> CompiledPattern {
    CompiledPattern {
        category,
        solution_family,
        regex: Regex::new(pattern).expect("pattern registry regex must compile"),
    }
}

impl PatternRegistry {
    /// Builds the catalogue. Regex ordering within a category defines match
    /// priority: the first pattern in the ordered list that matches a given
    /// span of text wins within that category (§4.1).
    fn build() -> Self {
        let patterns = vec![
            // dependency
            rule(
                Category::Dependency,
                "dependency",
                r"(?i)ModuleNotFoundError: No module named '([\w\-.]+)'",
            ),
            rule(
                Category::Dependency,
                "dependency",
                r"(?i)Cannot find module '([\w\-./@]+)'",
            ),
            rule(
                Category::Dependency,
                "dependency",
                r"(?i)npm ERR! missing: ([\w\-./@]+)",
            ),
            rule(
                Category::Dependency,
                "dependency",
                r"(?i)could not find (?:package|crate) `([\w\-]+)`",
            ),
            rule(
                Category::Dependency,
                "dependency",
                r"(?i)ImportError: No module named ([\w\-.]+)",
            ),
            // permission
            rule(
                Category::Permission,
                "permission",
                r"(?i)EACCES: permission denied, (?:access|open) '([^']+)'",
            ),
            rule(
                Category::Permission,
                "permission",
                r"(?i)Permission denied(?:: )?(?:\(os error 13\))? ?'?([^'\n]*)'?",
            ),
            rule(
                Category::Permission,
                "permission",
                r"(?i)PermissionError: \[Errno 13\] Permission denied: '([^']+)'",
            ),
            // configuration
            rule(
                Category::Configuration,
                "configuration",
                r"(?i)(?:KeyError|undefined variable|missing required key)[: ]+'?([\w\-.]+)'?",
            ),
            rule(
                Category::Configuration,
                "configuration",
                r"(?i)invalid configuration(?: value)? for '?([\w\-.]+)'?",
            ),
            rule(
                Category::Configuration,
                "configuration",
                r"(?i)\.env file (?:not found|missing)(?: at)? ?'?([^'\n]*)'?",
            ),
            // network
            rule(
                Category::Network,
                "network",
                r"(?i)(?:ENOTFOUND|getaddrinfo ENOTFOUND) ([\w\-.]+)",
            ),
            rule(
                Category::Network,
                "network",
                r"(?i)connection (?:refused|timed out) (?:to |at )?([\w\-.:]+)",
            ),
            rule(
                Category::Network,
                "network",
                r"(?i)SSL(?:Error)?: certificate verify failed.*?(?:for (\S+))?",
            ),
            rule(
                Category::Network,
                "network",
                r"(?i)DNS resolution failed for ([\w\-.]+)",
            ),
            // resource
            rule(
                Category::Resource,
                "resource",
                r"(?i)(?:out of memory|OOM|Killed|MemoryError)",
            ),
            rule(
                Category::Resource,
                "resource",
                r"(?i)no space left on device",
            ),
            rule(
                Category::Resource,
                "resource",
                r"(?i)disk quota exceeded",
            ),
            // build
            rule(
                Category::Build,
                "build",
                r"(?i)error\[E\d{4}\]: (.+)",
            ),
            rule(
                Category::Build,
                "build",
                r"(?i)compilation (?:failed|terminated)",
            ),
            rule(
                Category::Build,
                "build",
                r"(?i)undefined reference to `([^`]+)`",
            ),
            // test
            rule(
                Category::Test,
                "test",
                r"(?i)(\d+) (?:failed|failing)(?:,| tests?)",
            ),
            rule(
                Category::Test,
                "test",
                r"(?i)AssertionError(?:: (.*))?",
            ),
            rule(
                Category::Test,
                "test",
                r"(?i)test timed out after (\d+)",
            ),
            // deployment
            rule(
                Category::Deployment,
                "deployment",
                r"(?i)deployment (?:failed|rolled back)(?:: (.*))?",
            ),
            rule(
                Category::Deployment,
                "deployment",
                r"(?i)ImagePullBackOff|CrashLoopBackOff",
            ),
            // security
            rule(
                Category::Security,
                "security",
                r"(?i)(\d+) (?:critical|high) severity vulnerabilit(?:y|ies)",
            ),
            rule(
                Category::Security,
                "security",
                r"(?i)CVE-(\d{4}-\d+)",
            ),
        ];
        Self { patterns }
    }

    pub fn global() -> &'static PatternRegistry {
        static REGISTRY: OnceLock<PatternRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PatternRegistry::build)
    }

    /// Scans `text` for every rule, in catalogue order, returning a match for
    /// each category's first hit. Categories with no match are simply absent
    /// from the result — an empty log returns an empty vector (§8 boundary).
    pub fn scan(&self, text: &str) -> Vec<PatternMatch> {
        let mut seen = std::collections::HashSet::new();
        let mut matches = Vec::new();
        for pattern in &self.patterns {
            if seen.contains(&pattern.category) {
                continue;
            }
            if let Some(m) = pattern.regex.captures(text) {
                let whole = m.get(0).unwrap();
                let captures = (1..m.len())
                    .map(|i| m.get(i).map(|g| g.as_str().to_string()))
                    .collect();
                matches.push(PatternMatch {
                    category: pattern.category,
                    solution_family: pattern.solution_family,
                    span: (whole.start(), whole.end()),
                    matched_text: whole.as_str().to_string(),
                    captures,
                });
                seen.insert(pattern.category);
            }
        }
        matches
    }

    /// All matches of every rule (not deduplicated per category) — used by
    /// the Log Analyzer's gap-identification pass to know which byte ranges
    /// of the log are already covered by a rule hit.
    pub fn scan_all(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.regex.captures_iter(text) {
                let whole = m.get(0).unwrap();
                let captures = (1..m.len())
                    .map(|i| m.get(i).map(|g| g.as_str().to_string()))
                    .collect();
                matches.push(PatternMatch {
                    category: pattern.category,
                    solution_family: pattern.solution_family,
                    span: (whole.start(), whole.end()),
                    matched_text: whole.as_str().to_string(),
                    captures,
                });
            }
        }
        matches.sort_by_key(|m| m.span.0);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log_yields_no_matches() {
        let registry = PatternRegistry::global();
        assert!(registry.scan("").is_empty());
    }

    #[test]
    fn module_not_found_matches_dependency() {
        let registry = PatternRegistry::global();
        let matches = registry.scan("ModuleNotFoundError: No module named 'requests'");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, Category::Dependency);
        assert_eq!(matches[0].captures[0].as_deref(), Some("requests"));
    }

    #[test]
    fn permission_denied_matches_permission() {
        let registry = PatternRegistry::global();
        let matches = registry.scan("EACCES: permission denied, access '/var/log/app.log'");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, Category::Permission);
        assert_eq!(matches[0].captures[0].as_deref(), Some("/var/log/app.log"));
    }

    #[test]
    fn first_match_wins_within_a_category() {
        let registry = PatternRegistry::global();
        let text = "ModuleNotFoundError: No module named 'requests'\nnpm ERR! missing: lodash";
        let matches = registry.scan(text);
        let dependency_hits: Vec<_> = matches
            .iter()
            .filter(|m| m.category == Category::Dependency)
            .collect();
        assert_eq!(dependency_hits.len(), 1);
        assert!(dependency_hits[0].matched_text.contains("requests"));
    }

    #[test]
    fn scan_all_preserves_arrival_order() {
        let registry = PatternRegistry::global();
        let text = "no space left on device\nModuleNotFoundError: No module named 'x'";
        let matches = registry.scan_all(text);
        assert_eq!(matches[0].category, Category::Resource);
        assert_eq!(matches[1].category, Category::Dependency);
    }
}
