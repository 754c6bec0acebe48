use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Server-assigned entry identity. Stable for the lifetime of the entry.
pub type EntryId = i64;

// ============================================================================
// Entry Status
// ============================================================================

/// Read state of an entry as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Unread,
    Read,
}

impl EntryStatus {
    /// The opposite status, used by explicit user toggles.
    pub fn toggled(self) -> Self {
        match self {
            Self::Unread => Self::Read,
            Self::Read => Self::Unread,
        }
    }

    /// Wire name (`"read"` / `"unread"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }

    pub fn is_unread(self) -> bool {
        self == Self::Unread
    }
}

// ============================================================================
// Entry
// ============================================================================

/// The feed an entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRef {
    pub id: i64,
    pub title: Arc<str>,
}

/// A single article synchronized from the feed service.
///
/// Everything except `status` and `starred` is immutable once the entry has
/// been built from a server response. String fields are `Arc<str>` so list
/// snapshots and the detail pane can clone entries cheaply.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: EntryId,
    pub feed_id: i64,
    pub title: Arc<str>,
    pub url: Option<Arc<str>>,
    pub author: Arc<str>,
    pub content: Arc<str>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: EntryStatus,
    pub starred: bool,
    pub feed: FeedRef,
    first_image: OnceLock<Option<Arc<str>>>,
}

impl Entry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntryId,
        feed: FeedRef,
        title: impl Into<Arc<str>>,
        url: Option<Arc<str>>,
        author: impl Into<Arc<str>>,
        content: impl Into<Arc<str>>,
        published_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        status: EntryStatus,
        starred: bool,
    ) -> Self {
        Self {
            id,
            feed_id: feed.id,
            title: title.into(),
            url,
            author: author.into(),
            content: content.into(),
            published_at,
            created_at,
            status,
            starred,
            feed,
            first_image: OnceLock::new(),
        }
    }

    /// First `<img src>` in the entry content, parsed on first access.
    pub fn first_image(&self) -> Option<&str> {
        self.first_image
            .get_or_init(|| parse_first_image(&self.content).map(Arc::from))
            .as_deref()
    }

    /// Copy the mutable fields of `patch` onto this entry.
    pub(crate) fn apply(&mut self, patch: &EntryPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(starred) = patch.starred {
            self.starred = starred;
        }
    }
}

/// Extract the first image source from HTML content.
///
/// Only looks at `src` attributes of `<img>` tags; quoting may be single or
/// double. Returns `None` for content without images or with empty `src`.
pub fn parse_first_image(html: &str) -> Option<&str> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = lower[from..].find("<img") {
        let tag_start = from + rel;
        let tag_end = lower[tag_start..]
            .find('>')
            .map_or(lower.len(), |e| tag_start + e);
        let tag = &lower[tag_start..tag_end];

        if let Some(offset) = src_value_offset(tag) {
            let value_start = tag_start + offset;
            let quote = html[value_start..].chars().next()?;
            if quote == '"' || quote == '\'' {
                let rest = &html[value_start + 1..];
                if let Some(len) = rest.find(quote) {
                    let src = rest[..len].trim();
                    if !src.is_empty() {
                        return Some(src);
                    }
                }
            }
        }
        from = tag_end.max(tag_start + 4);
        if from >= lower.len() {
            break;
        }
    }
    None
}

/// Offset of the `src` value inside a lowercased tag. Only a whole attribute
/// name counts, so `data-src` is skipped.
fn src_value_offset(tag: &str) -> Option<usize> {
    let bytes = tag.as_bytes();
    let mut from = 0;
    while let Some(rel) = tag[from..].find("src") {
        let at = from + rel;
        from = at + 3;
        if at == 0 || !bytes[at - 1].is_ascii_whitespace() {
            continue;
        }
        if let Some(value) = tag[at + 3..].trim_start().strip_prefix('=') {
            return Some(tag.len() - value.trim_start().len());
        }
    }
    None
}

// ============================================================================
// Patches and Pages
// ============================================================================

/// Partial update of the mutable entry fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub status: Option<EntryStatus>,
    pub starred: Option<bool>,
}

impl EntryPatch {
    pub fn status(status: EntryStatus) -> Self {
        Self {
            status: Some(status),
            starred: None,
        }
    }

    pub fn starred(starred: bool) -> Self {
        Self {
            status: None,
            starred: Some(starred),
        }
    }
}

/// One page of entries plus the server-side total for the query.
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    pub total: u64,
    pub entries: Vec<Entry>,
}

#[cfg(test)]
pub(crate) fn test_entry(id: EntryId, status: EntryStatus) -> Entry {
    let ts = DateTime::from_timestamp(1_700_000_000 + id * 60, 0).unwrap_or_default();
    Entry::new(
        id,
        FeedRef {
            id: 1,
            title: Arc::from("Test Feed"),
        },
        format!("Entry {}", id),
        Some(Arc::from(format!("https://example.com/{}", id))),
        "alice",
        "<p>content</p>",
        ts,
        ts,
        status,
        false,
    )
}
