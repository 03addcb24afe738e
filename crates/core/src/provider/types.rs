//! Types for metadata provider listings.

use serde::{Deserialize, Serialize};

/// A movie as returned by the metadata provider. Read-only; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    /// Provider movie ID.
    pub id: u64,
    /// Movie title.
    pub title: String,
    /// Poster path (relative to the provider image base URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    /// Release date (YYYY-MM-DD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// ISO 639-1 code of the original language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    /// Average vote (0-10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    /// Provider popularity score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    /// Synopsis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Number of votes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
}

impl CatalogItem {
    /// Get the release year from the release date.
    pub fn year(&self) -> Option<u32> {
        self.release_date
            .as_ref()
            .and_then(|d| d.split('-').next())
            .and_then(|y| y.parse().ok())
    }

    /// Rating with one decimal, or "N/A".
    pub fn display_rating(&self) -> String {
        match self.vote_average {
            Some(v) => format!("{:.1}", v),
            None => "N/A".to_string(),
        }
    }

    /// Release year, or "N/A".
    pub fn display_year(&self) -> String {
        self.year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// What to ask the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Default listing, most popular first.
    Popular,
    /// Keyword search.
    Keyword(String),
}

impl CatalogQuery {
    /// Map a debounced input to a listing request. Only the empty string
    /// selects the popular listing.
    pub fn from_input(input: &str) -> Self {
        if input.is_empty() {
            Self::Popular
        } else {
            Self::Keyword(input.to_string())
        }
    }

    /// Short label used in logs and metrics.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::Keyword(_) => "keyword",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(release_date: Option<&str>, vote_average: Option<f64>) -> CatalogItem {
        CatalogItem {
            id: 438631,
            title: "Dune".to_string(),
            poster_path: Some("/d5NXSklXo0qyIYkgV94XAgMIckC.jpg".to_string()),
            release_date: release_date.map(String::from),
            original_language: Some("en".to_string()),
            vote_average,
            popularity: Some(120.5),
            overview: None,
            vote_count: Some(12000),
        }
    }

    #[test]
    fn test_year_and_rating() {
        let dune = item(Some("2021-09-15"), Some(7.783));
        assert_eq!(dune.year(), Some(2021));
        assert_eq!(dune.display_year(), "2021");
        assert_eq!(dune.display_rating(), "7.8");
    }

    #[test]
    fn test_missing_fields_display_na() {
        let unknown = item(None, None);
        assert_eq!(unknown.year(), None);
        assert_eq!(unknown.display_year(), "N/A");
        assert_eq!(unknown.display_rating(), "N/A");

        let blank_date = item(Some(""), None);
        assert_eq!(blank_date.year(), None);
    }

    #[test]
    fn test_query_from_input() {
        assert_eq!(CatalogQuery::from_input(""), CatalogQuery::Popular);
        assert_eq!(
            CatalogQuery::from_input("dune"),
            CatalogQuery::Keyword("dune".to_string())
        );
        // Whitespace is still a keyword search
        assert_eq!(CatalogQuery::from_input(" ").mode(), "keyword");
    }
}
