//! Optimistic read/starred mutations.
//!
//! A change is applied to the store immediately and the remote request is
//! dispatched by the caller. Requests are serialized per (entry, field): while
//! one is in flight, further toggles only change the local value. When the
//! in-flight request settles successfully and the local value has drifted
//! from what was sent, a single follow-up request carries the latest value.
//! A failed request rolls the field back to the last value the server
//! confirmed.

use super::pagination::Pagination;
use crate::api::{ApiError, EntryContext};
use crate::store::{EntryId, EntryPatch, EntryStatus, EntryStore, PendingField};
use std::collections::HashMap;

/// Identifies one dispatched request so its settlement can be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationTicket(u64);

/// Remote call the caller must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRequest {
    Status {
        ticket: MutationTicket,
        id: EntryId,
        status: EntryStatus,
    },
    /// The server flips the flag; the request carries no value.
    ToggleStarred { ticket: MutationTicket, id: EntryId },
}

impl MutationRequest {
    pub fn ticket(&self) -> MutationTicket {
        match self {
            Self::Status { ticket, .. } | Self::ToggleStarred { ticket, .. } => *ticket,
        }
    }

    pub fn entry_id(&self) -> EntryId {
        match self {
            Self::Status { id, .. } | Self::ToggleStarred { id, .. } => *id,
        }
    }
}

/// Result of a local optimistic apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// `None` when a request for the same field is already in flight.
    pub request: Option<MutationRequest>,
    /// Change to apply to the unread counter (-1, 0 or +1).
    pub unread_delta: i64,
}

/// What the caller must do after a request settles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    pub follow_up: Option<MutationRequest>,
    pub unread_delta: i64,
    /// Set when the request failed and the field was rolled back.
    pub error: Option<ApiError>,
}

/// Bulk "mark all as read" to dispatch. Always followed by a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkRequest {
    pub context: EntryContext,
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Track<T> {
    /// Last value the server acknowledged (or held before the first apply).
    confirmed: T,
    ticket: MutationTicket,
    /// Value the in-flight request will leave on the server.
    sent: T,
}

#[derive(Debug, Default)]
pub struct MutationCoordinator {
    next_ticket: u64,
    status: HashMap<EntryId, Track<EntryStatus>>,
    starred: HashMap<EntryId, Track<bool>>,
}

impl MutationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a request for `id` is currently in flight.
    pub fn is_in_flight(&self, id: EntryId) -> bool {
        self.status.contains_key(&id) || self.starred.contains_key(&id)
    }

    /// Forget all tracking. Used on context switch, after the store has been
    /// cleared; settlements for forgotten tickets are ignored.
    pub fn reset(&mut self) {
        self.status.clear();
        self.starred.clear();
    }

    pub fn toggle_status(&mut self, store: &mut EntryStore, id: EntryId) -> Option<Applied> {
        let current = store.get(id)?.status;
        self.set_status(store, id, current.toggled())
    }

    /// Force a status. Returns `None` if the entry is unknown or already has
    /// that status.
    pub fn set_status(
        &mut self,
        store: &mut EntryStore,
        id: EntryId,
        status: EntryStatus,
    ) -> Option<Applied> {
        let previous = store.get(id)?.status;
        if previous == status {
            return None;
        }
        store.mutate(id, EntryPatch::status(status));
        let unread_delta = unread_delta(previous, status);

        if self.status.contains_key(&id) {
            tracing::debug!(entry_id = id, "Status request in flight, deferring");
            return Some(Applied {
                request: None,
                unread_delta,
            });
        }

        let ticket = self.ticket();
        self.status.insert(
            id,
            Track {
                confirmed: previous,
                ticket,
                sent: status,
            },
        );
        store.begin_pending(id, PendingField::Status);
        Some(Applied {
            request: Some(MutationRequest::Status { ticket, id, status }),
            unread_delta,
        })
    }

    pub fn toggle_starred(&mut self, store: &mut EntryStore, id: EntryId) -> Option<Applied> {
        let previous = store.get(id)?.starred;
        store.mutate(id, EntryPatch::starred(!previous));

        if self.starred.contains_key(&id) {
            tracing::debug!(entry_id = id, "Starred request in flight, deferring");
            return Some(Applied {
                request: None,
                unread_delta: 0,
            });
        }

        let ticket = self.ticket();
        self.starred.insert(
            id,
            Track {
                confirmed: previous,
                ticket,
                sent: !previous,
            },
        );
        store.begin_pending(id, PendingField::Starred);
        Some(Applied {
            request: Some(MutationRequest::ToggleStarred { ticket, id }),
            unread_delta: 0,
        })
    }

    /// Reconcile a settled request.
    pub fn settle(
        &mut self,
        store: &mut EntryStore,
        request: &MutationRequest,
        result: Result<(), ApiError>,
    ) -> Settlement {
        match *request {
            MutationRequest::Status { ticket, id, .. } => self.settle_status(store, ticket, id, result),
            MutationRequest::ToggleStarred { ticket, id } => {
                self.settle_starred(store, ticket, id, result)
            }
        }
    }

    /// Optimistically mark every loaded entry as read and zero the unread
    /// count. Failures of the bulk request are not rolled back; the caller
    /// always follows up with a refresh.
    pub fn mark_all_read(
        &mut self,
        store: &mut EntryStore,
        pagination: &mut Pagination,
        context: EntryContext,
    ) -> Result<BulkRequest, ApiError> {
        if !context.supports_mark_all_read() {
            return Err(ApiError::Validation(format!(
                "Mark all as read is not available in {}",
                context.label()
            )));
        }
        let touched = store.mutate_all(EntryPatch::status(EntryStatus::Read));
        pagination.zero_unread_count();
        tracing::info!(context = ?context, entries = touched.len(), "Marked all loaded entries read");
        Ok(BulkRequest { context })
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ticket(&mut self) -> MutationTicket {
        self.next_ticket += 1;
        MutationTicket(self.next_ticket)
    }

    fn settle_status(
        &mut self,
        store: &mut EntryStore,
        ticket: MutationTicket,
        id: EntryId,
        result: Result<(), ApiError>,
    ) -> Settlement {
        let Some(track) = self.status.get(&id).copied() else {
            return Settlement::default();
        };
        if track.ticket != ticket {
            return Settlement::default();
        }
        let local = store.get(id).map(|e| e.status);

        match result {
            Ok(()) => match local {
                Some(local) if local != track.sent => {
                    let ticket = self.ticket();
                    self.status.insert(
                        id,
                        Track {
                            confirmed: track.sent,
                            ticket,
                            sent: local,
                        },
                    );
                    tracing::debug!(entry_id = id, status = local.as_str(), "Sending follow-up status");
                    Settlement {
                        follow_up: Some(MutationRequest::Status {
                            ticket,
                            id,
                            status: local,
                        }),
                        ..Settlement::default()
                    }
                }
                _ => {
                    self.finish(store, id, PendingField::Status);
                    Settlement::default()
                }
            },
            Err(err) => {
                self.finish(store, id, PendingField::Status);
                let mut unread = 0;
                if let Some(local) = local {
                    if local != track.confirmed {
                        store.mutate(id, EntryPatch::status(track.confirmed));
                        unread = unread_delta(local, track.confirmed);
                    }
                }
                tracing::warn!(entry_id = id, error = %err, "Status update failed, rolled back");
                Settlement {
                    follow_up: None,
                    unread_delta: unread,
                    error: Some(err),
                }
            }
        }
    }

    fn settle_starred(
        &mut self,
        store: &mut EntryStore,
        ticket: MutationTicket,
        id: EntryId,
        result: Result<(), ApiError>,
    ) -> Settlement {
        let Some(track) = self.starred.get(&id).copied() else {
            return Settlement::default();
        };
        if track.ticket != ticket {
            return Settlement::default();
        }
        let local = store.get(id).map(|e| e.starred);

        match result {
            Ok(()) => match local {
                Some(local) if local != track.sent => {
                    let ticket = self.ticket();
                    self.starred.insert(
                        id,
                        Track {
                            confirmed: track.sent,
                            ticket,
                            sent: local,
                        },
                    );
                    Settlement {
                        follow_up: Some(MutationRequest::ToggleStarred { ticket, id }),
                        ..Settlement::default()
                    }
                }
                _ => {
                    self.finish(store, id, PendingField::Starred);
                    Settlement::default()
                }
            },
            Err(err) => {
                self.finish(store, id, PendingField::Starred);
                if local.is_some_and(|local| local != track.confirmed) {
                    store.mutate(id, EntryPatch::starred(track.confirmed));
                }
                tracing::warn!(entry_id = id, error = %err, "Starred update failed, rolled back");
                Settlement {
                    error: Some(err),
                    ..Settlement::default()
                }
            }
        }
    }

    fn finish(&mut self, store: &mut EntryStore, id: EntryId, field: PendingField) {
        match field {
            PendingField::Status => {
                self.status.remove(&id);
            }
            PendingField::Starred => {
                self.starred.remove(&id);
            }
        }
        store.end_pending(id, field);
    }
}

fn unread_delta(from: EntryStatus, to: EntryStatus) -> i64 {
    match (from, to) {
        (EntryStatus::Unread, EntryStatus::Read) => -1,
        (EntryStatus::Read, EntryStatus::Unread) => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_entry;
    use pretty_assertions::assert_eq;

    fn store_with(entries: &[(EntryId, EntryStatus)]) -> EntryStore {
        let mut store = EntryStore::new();
        store.upsert_many(entries.iter().map(|&(id, s)| test_entry(id, s)).collect());
        store
    }

    fn transport() -> ApiError {
        ApiError::transport("connection reset")
    }

    #[test]
    fn test_toggle_applies_locally_and_requests() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();

        let applied = coordinator.toggle_status(&mut store, 1).unwrap();
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Read);
        assert_eq!(applied.unread_delta, -1);
        assert!(matches!(
            applied.request,
            Some(MutationRequest::Status {
                id: 1,
                status: EntryStatus::Read,
                ..
            })
        ));
        assert!(store.is_pending(1, PendingField::Status));
    }

    #[test]
    fn test_success_clears_tracking() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();
        let request = coordinator
            .toggle_status(&mut store, 1)
            .unwrap()
            .request
            .unwrap();

        let settlement = coordinator.settle(&mut store, &request, Ok(()));
        assert_eq!(settlement, Settlement::default());
        assert!(!coordinator.is_in_flight(1));
        assert!(!store.is_pending(1, PendingField::Status));
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Read);
    }

    #[test]
    fn test_failure_rolls_back() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();
        let request = coordinator
            .toggle_status(&mut store, 1)
            .unwrap()
            .request
            .unwrap();

        let settlement = coordinator.settle(&mut store, &request, Err(transport()));
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Unread);
        assert_eq!(settlement.unread_delta, 1);
        assert_eq!(settlement.error, Some(transport()));
        assert!(!store.is_pending(1, PendingField::Status));
    }

    #[test]
    fn test_double_toggle_round_trip_sends_follow_up() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();

        let first = coordinator.toggle_status(&mut store, 1).unwrap();
        let second = coordinator.toggle_status(&mut store, 1).unwrap();
        assert!(second.request.is_none());
        assert_eq!(first.unread_delta + second.unread_delta, 0);
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Unread);

        let settlement = coordinator.settle(&mut store, &first.request.unwrap(), Ok(()));
        let follow_up = settlement.follow_up.unwrap();
        assert!(matches!(
            follow_up,
            MutationRequest::Status {
                status: EntryStatus::Unread,
                ..
            }
        ));

        let done = coordinator.settle(&mut store, &follow_up, Ok(()));
        assert!(done.follow_up.is_none());
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Unread);
        assert!(!coordinator.is_in_flight(1));
    }

    #[test]
    fn test_failure_after_deferred_toggle_restores_confirmed() {
        let mut store = store_with(&[(1, EntryStatus::Read)]);
        let mut coordinator = MutationCoordinator::new();

        let first = coordinator.toggle_status(&mut store, 1).unwrap();
        coordinator.toggle_status(&mut store, 1).unwrap();
        coordinator.toggle_status(&mut store, 1).unwrap();
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Unread);

        let settlement = coordinator.settle(&mut store, &first.request.unwrap(), Err(transport()));
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Read);
        assert_eq!(settlement.unread_delta, -1);
    }

    #[test]
    fn test_set_status_same_value_is_noop() {
        let mut store = store_with(&[(1, EntryStatus::Read)]);
        let mut coordinator = MutationCoordinator::new();
        assert!(coordinator
            .set_status(&mut store, 1, EntryStatus::Read)
            .is_none());
        assert!(coordinator
            .set_status(&mut store, 99, EntryStatus::Read)
            .is_none());
    }

    #[test]
    fn test_starred_rollback_and_follow_up() {
        let mut store = store_with(&[(1, EntryStatus::Read)]);
        let mut coordinator = MutationCoordinator::new();

        let request = coordinator
            .toggle_starred(&mut store, 1)
            .unwrap()
            .request
            .unwrap();
        assert!(store.get(1).unwrap().starred);
        coordinator.settle(&mut store, &request, Err(transport()));
        assert!(!store.get(1).unwrap().starred);

        let first = coordinator.toggle_starred(&mut store, 1).unwrap();
        coordinator.toggle_starred(&mut store, 1).unwrap();
        let settlement = coordinator.settle(&mut store, &first.request.unwrap(), Ok(()));
        assert!(matches!(
            settlement.follow_up,
            Some(MutationRequest::ToggleStarred { id: 1, .. })
        ));
    }

    #[test]
    fn test_pending_field_survives_refresh() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();
        coordinator.toggle_status(&mut store, 1).unwrap();

        store.replace_all(vec![test_entry(1, EntryStatus::Unread)]);
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Read);
    }

    #[test]
    fn test_settlement_after_reset_is_ignored() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut coordinator = MutationCoordinator::new();
        let request = coordinator
            .toggle_status(&mut store, 1)
            .unwrap()
            .request
            .unwrap();

        store.clear();
        coordinator.reset();
        let settlement = coordinator.settle(&mut store, &request, Err(transport()));
        assert_eq!(settlement, Settlement::default());
    }

    #[test]
    fn test_mark_all_read() {
        let mut store = store_with(&[(1, EntryStatus::Unread), (2, EntryStatus::Unread)]);
        let mut pagination = Pagination::new(EntryContext::All, 10);
        pagination.adjust_unread_count(12);
        let mut coordinator = MutationCoordinator::new();

        let bulk = coordinator
            .mark_all_read(&mut store, &mut pagination, EntryContext::All)
            .unwrap();
        assert_eq!(bulk.context, EntryContext::All);
        assert_eq!(pagination.unread_count(), 0);
        assert!(store
            .get_many(&[1, 2])
            .all(|e| e.status == EntryStatus::Read));
    }

    #[test]
    fn test_mark_all_read_refused_for_starred_and_history() {
        let mut store = store_with(&[(1, EntryStatus::Unread)]);
        let mut pagination = Pagination::new(EntryContext::Starred, 10);
        let mut coordinator = MutationCoordinator::new();

        for context in [EntryContext::Starred, EntryContext::History] {
            let err = coordinator
                .mark_all_read(&mut store, &mut pagination, context)
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert_eq!(store.get(1).unwrap().status, EntryStatus::Unread);
    }
}
