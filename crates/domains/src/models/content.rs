//! Snippets and pages, reduced to what the interaction layer needs.
//! Their full CRUD lives outside this core.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnippet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Ordering for snippet listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetSort {
    /// Newest first
    #[default]
    Latest,
    /// Most liked first, newest breaks ties
    Popular,
    /// Alphabetical by title
    Title,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort key {0:?}, expected latest, popular or title")]
pub struct UnknownSortKey(pub String);

impl FromStr for SnippetSort {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(SnippetSort::Latest),
            "popular" => Ok(SnippetSort::Popular),
            "title" => Ok(SnippetSort::Title),
            _ => Err(UnknownSortKey(s.to_string())),
        }
    }
}

/// A snippet with its aggregated engagement counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetSummary {
    #[serde(flatten)]
    pub snippet: CodeSnippet,
    pub like_count: u64,
    pub comment_count: u64,
}

/// One page of a listing plus enough bookkeeping for a client to walk it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_size: u32,
    /// 1-based.
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total_count: u64, current_page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            u32::try_from(total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            total_count,
            page_size,
            current_page,
            total_pages,
            has_previous_page: current_page > 1,
            has_next_page: current_page < total_pages,
        }
    }
}

/// Sorts summaries in place the way the relational store orders them.
/// Shared by in-process adapters so every backend agrees on tie-breaks.
pub fn sort_summaries(items: &mut [SnippetSummary], sort: SnippetSort) {
    match sort {
        SnippetSort::Latest => items.sort_by(|a, b| {
            b.snippet
                .created_at
                .cmp(&a.snippet.created_at)
                .then_with(|| b.snippet.id.cmp(&a.snippet.id))
        }),
        SnippetSort::Popular => items.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then_with(|| b.snippet.created_at.cmp(&a.snippet.created_at))
                .then_with(|| b.snippet.id.cmp(&a.snippet.id))
        }),
        SnippetSort::Title => items.sort_by(|a, b| {
            a.snippet
                .title
                .to_lowercase()
                .cmp(&b.snippet.title.to_lowercase())
                .then_with(|| a.snippet.id.cmp(&b.snippet.id))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_is_validated() {
        assert_eq!("Popular".parse::<SnippetSort>(), Ok(SnippetSort::Popular));
        assert_eq!(" title ".parse::<SnippetSort>(), Ok(SnippetSort::Title));
        assert!("random".parse::<SnippetSort>().is_err());
    }

    #[test]
    fn popular_breaks_ties_by_recency() {
        let owner = Uuid::now_v7();
        let old = Utc::now() - chrono::Duration::hours(1);
        let make = |title: &str, at, likes| SnippetSummary {
            snippet: CodeSnippet {
                id: Uuid::now_v7(),
                owner_id: owner,
                title: title.into(),
                language: "rust".into(),
                created_at: at,
            },
            like_count: likes,
            comment_count: 0,
        };
        let mut items = vec![make("a", old, 2), make("b", Utc::now(), 2), make("c", old, 5)];
        sort_summaries(&mut items, SnippetSort::Popular);
        let titles: Vec<_> = items.iter().map(|s| s.snippet.title.as_str()).collect();
        assert_eq!(titles, ["c", "b", "a"]);
    }

    #[test]
    fn paginated_rounds_pages_up() {
        let middle = Paginated::new(vec![4, 5], 5, 2, 2);
        assert_eq!(middle.total_pages, 3);
        assert!(middle.has_previous_page && middle.has_next_page);

        let last = Paginated::new(vec![5], 5, 3, 2);
        assert!(!last.has_next_page);

        let empty = Paginated::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_previous_page && !empty.has_next_page);

        let json = serde_json::to_value(&middle).unwrap();
        assert_eq!(json["totalCount"], 5);
        assert_eq!(json["hasNextPage"], true);
    }
}
