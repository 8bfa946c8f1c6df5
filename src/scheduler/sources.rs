//! Source name specifications and wildcard expansion

use crate::client::DataClient;
use crate::etl::Extractor;
use eyre::{Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// A literal source name or a glob pattern (`*`, `?`)
#[derive(Debug, Clone)]
pub enum SourceSpec {
    Literal(String),
    Pattern { glob: String, regex: Regex },
}

impl SourceSpec {
    /// Parse a configured source name
    ///
    /// # Errors
    /// Returns an error if the name is empty.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            eyre::bail!("Source name cannot be empty");
        }
        if spec.contains(['*', '?']) {
            let regex = glob_to_regex(spec)
                .with_context(|| format!("Invalid source pattern: {}", spec))?;
            Ok(Self::Pattern {
                glob: spec.to_string(),
                regex,
            })
        } else {
            Ok(Self::Literal(spec.to_string()))
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::Pattern { glob, .. } => f.write_str(glob),
        }
    }
}

/// Translate a glob into an anchored regex
///
/// `*` matches any run of characters and `?` exactly one; everything else
/// is matched literally.
pub fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                pattern.push_str(if c == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');
    Ok(Regex::new(&pattern)?)
}

/// Extractor that turns source specs into the concrete names to query
///
/// Literal names pass through. Patterns are listed through the client and
/// their matches sorted. The result keeps spec order and drops duplicates,
/// so the dispatch order is the same on every run against the same sources.
pub struct SourceResolver<'a, C> {
    client: &'a C,
    specs: &'a [SourceSpec],
}

impl<'a, C: DataClient> SourceResolver<'a, C> {
    pub fn new(client: &'a C, specs: &'a [SourceSpec]) -> Self {
        Self { client, specs }
    }
}

impl<C: DataClient> Extractor for SourceResolver<'_, C> {
    type Item = String;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for spec in self.specs {
            let resolved = match spec {
                SourceSpec::Literal(name) => vec![name.clone()],
                SourceSpec::Pattern { glob, regex } => {
                    let mut matched = self
                        .client
                        .list_sources(regex)
                        .await
                        .with_context(|| format!("Failed to resolve source pattern {}", glob))?;
                    matched.sort();
                    if matched.is_empty() {
                        log::warn!("Source pattern {} matched no sources", glob);
                    } else {
                        log::debug!("Source pattern {} matched {} source(s)", glob, matched.len());
                    }
                    matched
                }
            };

            for name in resolved {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FetchFuture, FetchRequest};

    struct Listing(Vec<&'static str>);

    impl DataClient for Listing {
        async fn list_sources(&self, pattern: &Regex) -> Result<Vec<String>> {
            Ok(self
                .0
                .iter()
                .filter(|n| pattern.is_match(n))
                .map(|n| n.to_string())
                .collect())
        }

        fn fetch(&self, _request: &FetchRequest) -> Result<FetchFuture> {
            eyre::bail!("not used")
        }
    }

    struct BrokenListing;

    impl DataClient for BrokenListing {
        async fn list_sources(&self, _pattern: &Regex) -> Result<Vec<String>> {
            eyre::bail!("listing unavailable")
        }

        fn fetch(&self, _request: &FetchRequest) -> Result<FetchFuture> {
            eyre::bail!("not used")
        }
    }

    fn specs(names: &[&str]) -> Vec<SourceSpec> {
        names.iter().map(|n| SourceSpec::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_parse() {
        assert!(!SourceSpec::parse("WebLogs").unwrap().is_pattern());
        assert!(SourceSpec::parse("Web*").unwrap().is_pattern());
        assert!(SourceSpec::parse("Web?Logs").unwrap().is_pattern());
        assert!(SourceSpec::parse("  ").is_err());
        assert_eq!(SourceSpec::parse(" Web* ").unwrap().to_string(), "Web*");
    }

    #[test]
    fn test_glob_to_regex() {
        let regex = glob_to_regex("WAWS*Table?ROD*").unwrap();
        assert!(regex.is_match("WAWSAntaresIISLogWorkerTablePRODBAY013Ver6v0"));
        assert!(!regex.is_match("xWAWSAntaresTablePROD"));
        assert!(!regex.is_match("WAWSAntaresTableROD"));

        // Regex metacharacters are literal
        let regex = glob_to_regex("a.b+*").unwrap();
        assert!(regex.is_match("a.b+c"));
        assert!(!regex.is_match("axb+c"));
    }

    #[tokio::test]
    async fn test_resolve_mixed_specs() {
        let client = Listing(vec!["WebB", "WebA", "Worker", "Other"]);
        let specs = specs(&["Literal", "Web*", "WebA", "W*r"]);

        let names = SourceResolver::new(&client, &specs).extract().await.unwrap();
        assert_eq!(names, vec!["Literal", "WebA", "WebB", "Worker"]);
    }

    #[tokio::test]
    async fn test_pattern_without_matches_is_not_an_error() {
        let client = Listing(vec!["WebA"]);
        let specs = specs(&["Nothing*"]);

        let names = SourceResolver::new(&client, &specs).extract().await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let specs = specs(&["Literal", "Web*"]);
        let err = SourceResolver::new(&BrokenListing, &specs)
            .extract()
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("listing unavailable"));
    }

    #[tokio::test]
    async fn test_literals_skip_listing() {
        let specs = specs(&["A", "B"]);
        let names = SourceResolver::new(&BrokenListing, &specs)
            .extract()
            .await
            .unwrap();
        assert_eq!(names, vec!["A", "B"]);
    }
}
