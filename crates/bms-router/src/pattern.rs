//! Match patterns for routes.
//!
//! Three spellings are accepted:
//! - `/…/` is a regular expression (the slashes are stripped)
//! - text containing `*` is a glob, each `*` matching any run of characters
//! - anything else is a literal
//!
//! Every kind is compiled to a regex anchored at both ends, so a pattern
//! must match the whole candidate. [`Pattern::check`] uses the same rule.

use std::fmt;

use regex::Regex;

use crate::error::{Result, RouterError};

/// How a pattern was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Exact text.
    Literal,
    /// Text with `*` wildcards.
    Glob,
    /// A `/…/` delimited regular expression.
    Regex,
}

impl PatternKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Glob => "glob",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled match pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    regex: Regex,
}

impl Pattern {
    /// Parses and compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidPattern` if the text is empty or the
    /// regular expression does not compile.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(invalid(text, "pattern cannot be empty"));
        }

        let (kind, body) = if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
            let inner = &text[1..text.len() - 1];
            if inner.is_empty() {
                return Err(invalid(text, "regex pattern cannot be empty"));
            }
            (PatternKind::Regex, inner.to_string())
        } else if text.contains('*') {
            let body = text
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            (PatternKind::Glob, body)
        } else {
            (PatternKind::Literal, regex::escape(text))
        };

        let regex = Regex::new(&format!("^(?:{body})$"))
            .map_err(|e| invalid(text, &e.to_string()))?;

        Ok(Self {
            source: text.to_string(),
            kind,
            regex,
        })
    }

    /// Compiles `pattern` and tests it against `candidate`.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidPattern` if the pattern does not compile.
    pub fn check(pattern: &str, candidate: &str) -> Result<bool> {
        Ok(Self::parse(pattern)?.is_match(candidate))
    }

    /// Returns true if the pattern matches the whole candidate.
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern text as configured.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// How the pattern was written.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.kind
    }

    /// The compiled, anchored expression.
    #[must_use]
    pub fn as_regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(pattern: &str, reason: &str) -> RouterError {
    RouterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("string", "string", true ; "literal exact")]
    #[test_case("string", "notastring", false ; "literal other")]
    #[test_case("tenant-prod", "tenant-prod-extra", false ; "literal is anchored")]
    #[test_case("tenant.prod", "tenantXprod", false ; "literal dot is not a wildcard")]
    #[test_case("tenant-*", "tenant-prod", true ; "glob suffix")]
    #[test_case("tenant-*", "trout-prod", false ; "glob suffix other")]
    #[test_case("tenant-*-watch", "tenant-prod-watch", true ; "glob middle")]
    #[test_case("tenant-*-watch", "trout-prod-watch", false ; "glob middle other")]
    #[test_case("*-prod", "tenant-prod", true ; "glob prefix")]
    #[test_case("*-prod", "tenant-preprod", false ; "glob prefix other")]
    #[test_case("*", "anything", true ; "glob star")]
    #[test_case("/tenant-(prod|stage)/", "tenant-prod", true ; "regex prod")]
    #[test_case("/tenant-(prod|stage)/", "tenant-stage", true ; "regex stage")]
    #[test_case("/tenant-(prod|stage)/", "tenant-dev", false ; "regex dev")]
    #[test_case("/tenant/", "tenant-prod", false ; "regex is anchored")]
    #[test_case("tenant-(prod|stage)/", "tenant-dev", false ; "half delimited is literal")]
    fn test_check_patterns(pattern: &str, candidate: &str, expected: bool) {
        assert_eq!(Pattern::check(pattern, candidate).unwrap(), expected);
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(Pattern::parse("foo").unwrap().kind(), PatternKind::Literal);
        assert_eq!(Pattern::parse("foo-*").unwrap().kind(), PatternKind::Glob);
        assert_eq!(Pattern::parse("/fo+/").unwrap().kind(), PatternKind::Regex);
    }

    #[test]
    fn test_parse_keeps_source() {
        let pattern = Pattern::parse("/tenant-(prod|stage)/").unwrap();
        assert_eq!(pattern.source(), "/tenant-(prod|stage)/");
        assert_eq!(pattern.as_regex_str(), "^(?:tenant-(prod|stage))$");
        assert_eq!(pattern.to_string(), "/tenant-(prod|stage)/");
    }

    #[test]
    fn test_empty_pattern_fails() {
        assert!(matches!(
            Pattern::parse(""),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Pattern::parse("//"),
            Err(RouterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_bad_regex_fails() {
        let err = Pattern::parse("/tenant-(/").unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { ref pattern, .. } if pattern == "/tenant-(/"));
    }

    #[test]
    fn test_single_slash_is_literal() {
        let pattern = Pattern::parse("/").unwrap();
        assert_eq!(pattern.kind(), PatternKind::Literal);
        assert!(pattern.is_match("/"));
    }

    #[test]
    fn test_equality_uses_compiled_form() {
        assert_eq!(Pattern::parse("a*").unwrap(), Pattern::parse("a*").unwrap());
        assert_ne!(Pattern::parse("a*").unwrap(), Pattern::parse("a").unwrap());
        assert_ne!(Pattern::parse("/a/").unwrap(), Pattern::parse("a").unwrap());
    }
}
