//! Wire types for the Miniflux-compatible REST API and the fetch parameters
//! the sync layer hands to an [`EntrySource`](super::EntrySource).

use crate::store::{Entry, EntryId, EntryPage, EntryStatus, FeedRef};
use crate::sync::filter::{FilterType, OrderBy, OrderDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Context
// ============================================================================

/// Logical scope of the entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryContext {
    #[default]
    All,
    Starred,
    /// Fixed snapshot of read entries, most recently changed first.
    History,
    Feed(i64),
    Category(i64),
}

impl EntryContext {
    /// History lists only contain read entries, so one fetch serves both the
    /// "all" and "unread" views.
    pub fn has_unread_projection(&self) -> bool {
        !matches!(self, Self::History)
    }

    /// Whether "mark all as read" applies to this context.
    pub fn supports_mark_all_read(&self) -> bool {
        !matches!(self, Self::Starred | Self::History)
    }

    pub fn label(&self) -> String {
        match self {
            Self::All => "All".to_string(),
            Self::Starred => "Starred".to_string(),
            Self::History => "History".to_string(),
            Self::Feed(id) => format!("Feed #{}", id),
            Self::Category(id) => format!("Category #{}", id),
        }
    }
}

// ============================================================================
// Fetch Parameters
// ============================================================================

/// Parameters for one `fetch_entries` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub context: EntryContext,
    pub offset: usize,
    pub limit: usize,
    /// Restrict to a status; `None` fetches every status.
    pub status: Option<EntryStatus>,
    pub order_by: OrderBy,
    pub direction: OrderDirection,
    pub filter_type: Option<FilterType>,
    pub filter_string: Option<String>,
}

impl FetchParams {
    /// Query string pairs in the order the server documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
            ("direction", self.direction.as_str().to_string()),
        ];

        match self.context {
            EntryContext::History => {
                pairs.push(("order", "changed_at".to_string()));
                pairs.push(("status", EntryStatus::Read.as_str().to_string()));
            }
            _ => {
                pairs.push(("order", self.order_by.as_str().to_string()));
                if let Some(status) = self.status {
                    pairs.push(("status", status.as_str().to_string()));
                }
            }
        }

        if self.context == EntryContext::Starred {
            pairs.push(("starred", "true".to_string()));
        }

        // The server only supports full-text search, so narrowing by author
        // stays purely local.
        if let (Some(query), Some(kind)) = (&self.filter_string, self.filter_type) {
            if !query.trim().is_empty() && kind != FilterType::Author {
                pairs.push(("search", query.trim().to_string()));
            }
        }

        pairs
    }

    /// Request path relative to the server base URL.
    pub fn path(&self) -> String {
        match self.context {
            EntryContext::Feed(id) => format!("/v1/feeds/{}/entries", id),
            EntryContext::Category(id) => format!("/v1/categories/{}/entries", id),
            EntryContext::All | EntryContext::Starred | EntryContext::History => {
                "/v1/entries".to_string()
            }
        }
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct EntriesResponse {
    pub total: u64,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

impl EntriesResponse {
    pub(crate) fn into_page(self) -> EntryPage {
        EntryPage {
            total: self.total,
            entries: self.entries.into_iter().map(RawEntry::into_entry).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFeed {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// Entry as serialized by the server. Converted to [`Entry`] via
/// `into_entry()` with `Arc` wrapping.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    pub id: EntryId,
    pub feed_id: i64,
    pub status: EntryStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub starred: bool,
    pub feed: Option<RawFeed>,
}

impl RawEntry {
    pub(crate) fn into_entry(self) -> Entry {
        let feed = match self.feed {
            Some(f) => FeedRef {
                id: f.id,
                title: Arc::from(f.title),
            },
            None => FeedRef {
                id: self.feed_id,
                title: Arc::from(""),
            },
        };
        let url = (!self.url.is_empty()).then(|| Arc::from(self.url));
        Entry::new(
            self.id,
            feed,
            self.title,
            url,
            self.author,
            self.content,
            self.published_at,
            self.created_at.unwrap_or(self.published_at),
            self.status,
            self.starred,
        )
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateStatusRequest<'a> {
    pub entry_ids: &'a [EntryId],
    pub status: EntryStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub id: i64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FetchContentResponse {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(context: EntryContext) -> FetchParams {
        FetchParams {
            context,
            offset: 0,
            limit: 100,
            status: None,
            order_by: OrderBy::PublishedAt,
            direction: OrderDirection::Desc,
            filter_type: None,
            filter_string: None,
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(params(EntryContext::All).path(), "/v1/entries");
        assert_eq!(params(EntryContext::Feed(7)).path(), "/v1/feeds/7/entries");
        assert_eq!(
            params(EntryContext::Category(2)).path(),
            "/v1/categories/2/entries"
        );
    }

    #[test]
    fn test_query_pairs_unread() {
        let mut p = params(EntryContext::All);
        p.status = Some(EntryStatus::Unread);
        p.offset = 200;
        let pairs = p.query_pairs();
        assert!(pairs.contains(&("status", "unread".to_string())));
        assert!(pairs.contains(&("offset", "200".to_string())));
        assert!(pairs.contains(&("order", "published_at".to_string())));
        assert!(pairs.contains(&("direction", "desc".to_string())));
    }

    #[test]
    fn test_query_pairs_history_forces_read_and_changed_at() {
        let mut p = params(EntryContext::History);
        p.status = Some(EntryStatus::Unread);
        let pairs = p.query_pairs();
        assert!(pairs.contains(&("order", "changed_at".to_string())));
        assert!(pairs.contains(&("status", "read".to_string())));
        assert!(!pairs.contains(&("status", "unread".to_string())));
    }

    #[test]
    fn test_query_pairs_starred() {
        let pairs = params(EntryContext::Starred).query_pairs();
        assert!(pairs.contains(&("starred", "true".to_string())));
    }

    #[test]
    fn test_search_only_for_title_and_content() {
        let mut p = params(EntryContext::All);
        p.filter_string = Some(" rust ".to_string());
        p.filter_type = Some(FilterType::Title);
        assert!(p.query_pairs().contains(&("search", "rust".to_string())));

        p.filter_type = Some(FilterType::Author);
        assert!(!p.query_pairs().iter().any(|(k, _)| *k == "search"));
    }

    #[test]
    fn test_raw_entry_into_entry() {
        let json = r#"{
            "id": 42, "feed_id": 3, "status": "unread", "title": "Hello",
            "url": "https://example.com/a", "author": "alice",
            "content": "<img src=\"https://img/x.png\">",
            "published_at": "2024-01-02T03:04:05Z",
            "starred": true,
            "feed": {"id": 3, "title": "Example"}
        }"#;
        let raw: RawEntry = serde_json::from_str(json).unwrap();
        let entry = raw.into_entry();
        assert_eq!(entry.id, 42);
        assert_eq!(entry.status, EntryStatus::Unread);
        assert!(entry.starred);
        assert_eq!(&*entry.feed.title, "Example");
        assert_eq!(entry.created_at, entry.published_at);
        assert_eq!(entry.first_image(), Some("https://img/x.png"));
    }

    #[test]
    fn test_raw_entry_empty_url_is_none() {
        let json = r#"{"id": 1, "feed_id": 1, "status": "read", "url": "",
            "published_at": "2024-01-02T03:04:05Z", "feed": null}"#;
        let entry = serde_json::from_str::<RawEntry>(json).unwrap().into_entry();
        assert!(entry.url.is_none());
        assert_eq!(entry.feed.id, 1);
    }

    #[test]
    fn test_mark_all_support() {
        assert!(EntryContext::All.supports_mark_all_read());
        assert!(EntryContext::Feed(1).supports_mark_all_read());
        assert!(!EntryContext::Starred.supports_mark_all_read());
        assert!(!EntryContext::History.supports_mark_all_read());
    }
}
