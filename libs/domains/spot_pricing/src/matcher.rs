//! Comma-separated regular expression lists.
//!
//! Region, availability zone and instance-type filters are all given as
//! `"expr1,expr2,..."`. Each fragment is trimmed and compiled on its own;
//! an item is selected when any fragment matches it.

use regex::Regex;
use std::collections::HashSet;

use crate::error::{SpotError, SpotResult};

/// A compiled list of patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every fragment of `csv`.
    ///
    /// Empty fragments (`"a,,b"`, trailing commas) are skipped. An empty
    /// `csv` yields an empty set; callers treat that as "no filtering".
    pub fn parse(csv: &str) -> SpotResult<Self> {
        let patterns = csv
            .split(',')
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| {
                Regex::new(fragment).map_err(|source| SpotError::InvalidPattern {
                    pattern: fragment.to_string(),
                    source,
                })
            })
            .collect::<SpotResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Parse `csv` if it carries any text, `None` otherwise
    pub fn parse_optional(csv: Option<&str>) -> SpotResult<Option<Self>> {
        match csv.map(str::trim) {
            Some(csv) if !csv.is_empty() => Self::parse(csv).map(Some),
            _ => Ok(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if at least one pattern matches `candidate`
    pub fn is_match(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(candidate))
    }

    /// Select haystack items pattern by pattern.
    ///
    /// An item matched by several patterns appears once per matching
    /// pattern; use [`dedup_preserving_order`] downstream.
    pub fn select<S: AsRef<str>>(&self, haystack: &[S]) -> Vec<String> {
        self.patterns
            .iter()
            .flat_map(|re| {
                haystack
                    .iter()
                    .map(|item| item.as_ref())
                    .filter(move |item| re.is_match(item))
            })
            .map(str::to_string)
            .collect()
    }

    pub fn as_strs(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }
}

/// Filter `haystack` by the comma-separated patterns in `patterns_csv`
pub fn match_patterns<S: AsRef<str>>(haystack: &[S], patterns_csv: &str) -> SpotResult<Vec<String>> {
    Ok(PatternSet::parse(patterns_csv)?.select(haystack))
}

/// Remove duplicates, keeping the first occurrence of each item
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> Vec<String> {
        ["ap-south-1", "eu-west-1", "eu-west-2", "us-east-1", "us-west-2"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_select_returns_only_matching_haystack_items() {
        let haystack = regions();
        let found = match_patterns(&haystack, "^us-, west").unwrap();

        for item in &found {
            assert!(haystack.contains(item), "{item} is not in the haystack");
        }
        assert_eq!(
            found,
            vec!["us-east-1", "us-west-2", "eu-west-1", "eu-west-2", "us-west-2"]
        );
    }

    #[test]
    fn test_select_keeps_duplicates_for_multiple_patterns() {
        let found = match_patterns(&regions(), "us-east-1,east").unwrap();
        assert_eq!(found, vec!["us-east-1", "us-east-1"]);
        assert_eq!(dedup_preserving_order(found), vec!["us-east-1"]);
    }

    #[test]
    fn test_invalid_pattern_names_the_fragment() {
        let err = match_patterns(&regions(), "us-.*, eu-(west").unwrap_err();
        match err {
            SpotError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "eu-(west"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_fragments_are_skipped() {
        let set = PatternSet::parse("us-east-1, ,").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.select(&regions()), vec!["us-east-1"]);
    }

    #[test]
    fn test_parse_optional() {
        assert!(PatternSet::parse_optional(None).unwrap().is_none());
        assert!(PatternSet::parse_optional(Some("   ")).unwrap().is_none());
        let set = PatternSet::parse_optional(Some("[bf]$")).unwrap().unwrap();
        assert!(set.is_match("us-east-1b"));
        assert!(!set.is_match("us-east-1a"));
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let items = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_preserving_order(items), vec!["b", "a", "c"]);
    }
}
