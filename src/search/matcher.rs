use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Deserialize;

/// Stock text predicates for rows that don't bring their own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive substring.
    #[default]
    Substring,
    /// Skim-style fuzzy subsequence match.
    Fuzzy,
}

impl MatchMode {
    /// Parse from a config string; unknown values fall back to substring.
    pub fn from_str(s: &str) -> Self {
        match s {
            "fuzzy" => MatchMode::Fuzzy,
            _ => MatchMode::Substring,
        }
    }

    pub fn matches(self, haystack: &str, query: &str) -> bool {
        if query.is_empty() {
            return false;
        }
        match self {
            MatchMode::Substring => haystack.to_lowercase().contains(&query.to_lowercase()),
            MatchMode::Fuzzy => SkimMatcherV2::default()
                .ignore_case()
                .fuzzy_match(haystack, query)
                .is_some(),
        }
    }
}
