//! Filter and sort engine.
//!
//! `compute_visible` is a pure function of its inputs: the same entries and
//! filter always produce the same sequence. There is no ordering state kept
//! anywhere else.

use crate::api::EntryContext;
use crate::store::Entry;
use serde::Deserialize;
use std::cmp::Ordering;

// ============================================================================
// Filter Enums
// ============================================================================

/// Entry field the free-text filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    Title,
    Content,
    Author,
}

impl FilterType {
    pub fn next(self) -> Self {
        match self {
            Self::Title => Self::Content,
            Self::Content => Self::Author,
            Self::Author => Self::Title,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
            Self::Author => "author",
        }
    }
}

/// Which logical list is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStatus {
    #[default]
    All,
    Unread,
}

impl FilterStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::All => Self::Unread,
            Self::Unread => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Unread => "UNREAD",
        }
    }
}

/// Timestamp the list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    PublishedAt,
    CreatedAt,
}

impl OrderBy {
    pub fn next(self) -> Self {
        match self {
            Self::PublishedAt => Self::CreatedAt,
            Self::CreatedAt => Self::PublishedAt,
        }
    }

    /// Query parameter value understood by the server.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PublishedAt => "published_at",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

// ============================================================================
// Filter State
// ============================================================================

/// Text search the server can run. Author matching never leaves the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSearch {
    pub filter_type: FilterType,
    pub text: String,
}

/// UI-session filter state. Never sent anywhere except as fetch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub filter_string: String,
    pub filter_type: FilterType,
    pub filter_status: FilterStatus,
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
}

impl FilterState {
    pub fn with_order(order_by: OrderBy, order_direction: OrderDirection) -> Self {
        Self {
            order_by,
            order_direction,
            ..Self::default()
        }
    }

    /// Clear the text filter and status selection, keeping the sort order.
    ///
    /// Applied whenever the active context changes.
    pub fn reset_for_context(&mut self) {
        self.filter_string.clear();
        self.filter_type = FilterType::Title;
        self.filter_status = FilterStatus::All;
    }

    /// Clear only the text filter. Applied when the filter status changes.
    pub fn reset_text(&mut self) {
        self.filter_string.clear();
        self.filter_type = FilterType::Title;
    }

    /// The part of the text filter sent along with "all" list fetches.
    pub fn server_search(&self) -> Option<ServerSearch> {
        let text = self.filter_string.trim();
        if text.is_empty() || self.filter_type == FilterType::Author {
            return None;
        }
        Some(ServerSearch {
            filter_type: self.filter_type,
            text: text.to_string(),
        })
    }

    /// Whether an ordering change must go back to the server.
    ///
    /// The server orders pages during pagination, so re-sorting a partial
    /// local window is only acceptable for the fixed history snapshot.
    pub fn order_change_requires_refetch(context: &EntryContext) -> bool {
        !matches!(context, EntryContext::History)
    }

    fn matches(&self, entry: &Entry, needle: &str) -> bool {
        let haystack: &str = match self.filter_type {
            FilterType::Title => &entry.title,
            FilterType::Content => &entry.content,
            FilterType::Author => &entry.author,
        };
        haystack.to_lowercase().contains(needle)
    }

    fn sort_key(&self, entry: &Entry) -> i64 {
        match self.order_by {
            OrderBy::PublishedAt => entry.published_at.timestamp_millis(),
            OrderBy::CreatedAt => entry.created_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Visible Sequence
// ============================================================================

/// Compute the filtered, sorted sequence of entries to display.
///
/// - Empty `filter_string` passes every entry.
/// - Otherwise a case-insensitive substring match on the field chosen by
///   `filter_type`.
/// - Sorted by the `order_by` timestamp in `order_direction`; ties are
///   broken by ascending id regardless of direction.
///
/// Duplicate ids in the input appear once, at their first position.
pub fn compute_visible<'a, I>(entries: I, filter: &FilterState) -> Vec<&'a Entry>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let needle = if filter.filter_string.trim().is_empty() {
        String::new()
    } else {
        filter.filter_string.to_lowercase()
    };
    let mut seen = std::collections::HashSet::new();

    let mut visible: Vec<&Entry> = entries
        .into_iter()
        .filter(|e| seen.insert(e.id))
        .filter(|e| needle.is_empty() || filter.matches(e, &needle))
        .collect();

    visible.sort_by(|a, b| {
        let primary = filter.sort_key(a).cmp(&filter.sort_key(b));
        let primary = match filter.order_direction {
            OrderDirection::Asc => primary,
            OrderDirection::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        }
    });

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{test_entry, EntryStatus};
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn ids(entries: &[&Entry]) -> Vec<i64> {
        entries.iter().map(|e| e.id).collect()
    }

    fn entry_at(id: i64, ts: i64) -> Entry {
        let mut e = test_entry(id, EntryStatus::Unread);
        e.published_at = DateTime::from_timestamp(ts, 0).unwrap();
        e.created_at = DateTime::from_timestamp(ts, 0).unwrap();
        e
    }

    #[test]
    fn test_empty_filter_passes_all_sorted_desc() {
        let entries = vec![entry_at(1, 100), entry_at(2, 300), entry_at(3, 200)];
        let visible = compute_visible(&entries, &FilterState::default());
        assert_eq!(ids(&visible), vec![2, 3, 1]);
    }

    #[test]
    fn test_asc_order() {
        let entries = vec![entry_at(1, 100), entry_at(2, 300), entry_at(3, 200)];
        let filter = FilterState::with_order(OrderBy::PublishedAt, OrderDirection::Asc);
        assert_eq!(ids(&compute_visible(&entries, &filter)), vec![1, 3, 2]);
    }

    #[test]
    fn test_tie_break_by_id_ascending_in_both_directions() {
        let entries = vec![entry_at(9, 100), entry_at(4, 100), entry_at(7, 100)];
        let desc = FilterState::default();
        let asc = FilterState::with_order(OrderBy::PublishedAt, OrderDirection::Asc);
        assert_eq!(ids(&compute_visible(&entries, &desc)), vec![4, 7, 9]);
        assert_eq!(ids(&compute_visible(&entries, &asc)), vec![4, 7, 9]);
    }

    #[test]
    fn test_author_filter() {
        let mut alice = entry_at(1, 100);
        alice.author = Arc::from("alice");
        let mut bob = entry_at(2, 200);
        bob.author = Arc::from("bob");
        let entries = vec![alice, bob];

        let filter = FilterState {
            filter_type: FilterType::Author,
            filter_string: "alice".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&compute_visible(&entries, &filter)), vec![1]);
    }

    #[test]
    fn test_title_filter_is_case_insensitive() {
        let mut a = entry_at(1, 100);
        a.title = Arc::from("Rust Ownership Explained");
        let mut b = entry_at(2, 200);
        b.title = Arc::from("Go Generics");
        let entries = vec![a, b];

        let filter = FilterState {
            filter_string: "rUsT".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&compute_visible(&entries, &filter)), vec![1]);
    }

    #[test]
    fn test_content_filter_does_not_match_title() {
        let mut a = entry_at(1, 100);
        a.title = Arc::from("needle");
        a.content = Arc::from("<p>hay</p>");
        let entries = vec![a];

        let filter = FilterState {
            filter_type: FilterType::Content,
            filter_string: "needle".to_string(),
            ..FilterState::default()
        };
        assert!(compute_visible(&entries, &filter).is_empty());
    }

    #[test]
    fn test_padded_needle_keeps_its_spaces() {
        let mut a = entry_at(1, 100);
        a.title = Arc::from("Choosing a theme");
        let mut b = entry_at(2, 200);
        b.title = Arc::from("Read the docs");
        let entries = vec![a, b];

        let filter = FilterState {
            filter_string: " the ".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&compute_visible(&entries, &filter)), vec![2]);

        let blank = FilterState {
            filter_string: "   ".to_string(),
            ..FilterState::default()
        };
        assert_eq!(compute_visible(&entries, &blank).len(), 2);
    }

    #[test]
    fn test_server_search_skips_author_and_blank() {
        let mut filter = FilterState {
            filter_string: "  rust ".to_string(),
            filter_type: FilterType::Content,
            ..FilterState::default()
        };
        assert_eq!(
            filter.server_search(),
            Some(ServerSearch {
                filter_type: FilterType::Content,
                text: "rust".to_string(),
            })
        );
        filter.filter_type = FilterType::Author;
        assert_eq!(filter.server_search(), None);
        filter.filter_type = FilterType::Title;
        filter.filter_string = " ".to_string();
        assert_eq!(filter.server_search(), None);
    }

    #[test]
    fn test_order_by_created_at() {
        let mut a = entry_at(1, 100);
        a.created_at = DateTime::from_timestamp(500, 0).unwrap();
        let b = entry_at(2, 200);
        let entries = vec![a, b];
        let filter = FilterState::with_order(OrderBy::CreatedAt, OrderDirection::Desc);
        assert_eq!(ids(&compute_visible(&entries, &filter)), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let a = entry_at(1, 100);
        let refs = vec![&a, &a];
        assert_eq!(compute_visible(refs, &FilterState::default()).len(), 1);
    }

    #[test]
    fn test_history_does_not_refetch_on_order_change() {
        assert!(!FilterState::order_change_requires_refetch(&EntryContext::History));
        assert!(FilterState::order_change_requires_refetch(&EntryContext::All));
        assert!(FilterState::order_change_requires_refetch(&EntryContext::Feed(3)));
    }

    #[test]
    fn test_reset_for_context_keeps_order() {
        let mut filter = FilterState {
            filter_string: "x".to_string(),
            filter_type: FilterType::Author,
            filter_status: FilterStatus::Unread,
            order_by: OrderBy::CreatedAt,
            order_direction: OrderDirection::Asc,
        };
        filter.reset_for_context();
        assert_eq!(filter.filter_string, "");
        assert_eq!(filter.filter_type, FilterType::Title);
        assert_eq!(filter.filter_status, FilterStatus::All);
        assert_eq!(filter.order_by, OrderBy::CreatedAt);
        assert_eq!(filter.order_direction, OrderDirection::Asc);
    }

    fn arb_filter() -> impl Strategy<Value = FilterState> {
        (
            "[a-c]{0,2}",
            prop_oneof![
                Just(FilterType::Title),
                Just(FilterType::Content),
                Just(FilterType::Author)
            ],
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(s, t, asc, created)| FilterState {
                filter_string: s,
                filter_type: t,
                filter_status: FilterStatus::All,
                order_by: if created {
                    OrderBy::CreatedAt
                } else {
                    OrderBy::PublishedAt
                },
                order_direction: if asc {
                    OrderDirection::Asc
                } else {
                    OrderDirection::Desc
                },
            })
    }

    proptest! {
        #[test]
        fn prop_compute_visible_is_deterministic(
            specs in prop::collection::vec((0i64..50, 0i64..5, "[a-c]{0,4}"), 0..30),
            filter in arb_filter(),
        ) {
            let mut taken = std::collections::HashSet::new();
            let entries: Vec<Entry> = specs
                .iter()
                .filter(|(id, _, _)| taken.insert(*id))
                .map(|(id, ts, title)| {
                    let mut e = entry_at(*id, *ts);
                    e.title = Arc::from(title.as_str());
                    e
                })
                .collect();

            let first = ids(&compute_visible(&entries, &filter));
            let second = ids(&compute_visible(&entries, &filter));
            prop_assert_eq!(&first, &second);

            // Input order must not matter
            let reversed: Vec<&Entry> = entries.iter().rev().collect();
            let from_reversed = ids(&compute_visible(reversed, &filter));
            let mut a = first.clone();
            let mut b = from_reversed.clone();
            a.sort_unstable();
            b.sort_unstable();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_visible_is_sorted(
            specs in prop::collection::vec((0i64..50, 0i64..5), 0..30),
            filter in arb_filter(),
        ) {
            let entries: Vec<Entry> = specs.iter().map(|(id, ts)| entry_at(*id, *ts)).collect();
            let visible = compute_visible(&entries, &filter);
            for pair in visible.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let (ka, kb) = (filter.sort_key(a), filter.sort_key(b));
                match filter.order_direction {
                    OrderDirection::Asc => prop_assert!(ka < kb || (ka == kb && a.id < b.id)),
                    OrderDirection::Desc => prop_assert!(ka > kb || (ka == kb && a.id < b.id)),
                }
            }
        }
    }
}
