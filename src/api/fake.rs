//! In-memory [`EntrySource`] for unit tests.

use super::{ApiError, EntryContext, EntrySource, FetchParams};
use crate::store::{Entry, EntryId, EntryPage, EntryStatus};
use crate::sync::filter::{compute_visible, FilterState};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Fetch(FetchParams),
    Status(Vec<EntryId>, EntryStatus),
    Starred(EntryId),
    MarkAll(EntryContext),
    Original(EntryId),
}

/// Operations whose failure can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Fetch,
    Status,
    Starred,
    MarkAll,
    Original,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    entries: Mutex<Vec<Entry>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(Op, ApiError)>>,
    panics: Mutex<Vec<Op>>,
}

impl FakeSource {
    pub(crate) fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Every following call to `op` fails with `err`.
    pub(crate) fn fail(&self, op: Op, err: ApiError) {
        self.failures.lock().unwrap().push((op, err));
    }

    /// The next call to `op` panics.
    pub(crate) fn panic_once(&self, op: Op) {
        self.panics.lock().unwrap().push(op);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn fetches(&self) -> Vec<FetchParams> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn server_status(&self, id: EntryId) -> Option<EntryStatus> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.status)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: Op) -> Result<(), ApiError> {
        let scripted_panic = {
            let mut panics = self.panics.lock().unwrap();
            match panics.iter().position(|o| *o == op) {
                Some(i) => {
                    panics.remove(i);
                    true
                }
                None => false,
            }
        };
        if scripted_panic {
            panic!("scripted {:?} panic", op);
        }
        match self.failures.lock().unwrap().iter().find(|(o, _)| *o == op) {
            Some((_, err)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntrySource for FakeSource {
    async fn fetch_entries(&self, params: &FetchParams) -> Result<EntryPage, ApiError> {
        self.record(Call::Fetch(params.clone()));
        self.check(Op::Fetch)?;

        let entries = self.entries.lock().unwrap();
        let mut filter = FilterState::with_order(params.order_by, params.direction);
        if let (Some(text), Some(kind)) = (&params.filter_string, params.filter_type) {
            filter.filter_string = text.clone();
            filter.filter_type = kind;
        }
        let matching: Vec<Entry> = compute_visible(entries.iter(), &filter)
            .into_iter()
            .filter(|e| match params.context {
                EntryContext::History => e.status == EntryStatus::Read,
                EntryContext::Starred => e.starred,
                EntryContext::Feed(id) => e.feed_id == id,
                EntryContext::Category(_) | EntryContext::All => true,
            })
            .filter(|e| params.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();

        Ok(EntryPage {
            total: matching.len() as u64,
            entries: matching
                .into_iter()
                .skip(params.offset)
                .take(params.limit)
                .collect(),
        })
    }

    async fn update_entry_status(
        &self,
        ids: &[EntryId],
        status: EntryStatus,
    ) -> Result<(), ApiError> {
        self.record(Call::Status(ids.to_vec(), status));
        self.check(Op::Status)?;
        for entry in self.entries.lock().unwrap().iter_mut() {
            if ids.contains(&entry.id) {
                entry.status = status;
            }
        }
        Ok(())
    }

    async fn update_entry_starred(&self, id: EntryId) -> Result<(), ApiError> {
        self.record(Call::Starred(id));
        self.check(Op::Starred)?;
        for entry in self.entries.lock().unwrap().iter_mut() {
            if entry.id == id {
                entry.starred = !entry.starred;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self, context: &EntryContext) -> Result<(), ApiError> {
        self.record(Call::MarkAll(*context));
        self.check(Op::MarkAll)?;
        for entry in self.entries.lock().unwrap().iter_mut() {
            entry.status = EntryStatus::Read;
        }
        Ok(())
    }

    async fn fetch_original_content(&self, id: EntryId) -> Result<String, ApiError> {
        self.record(Call::Original(id));
        self.check(Op::Original)?;
        Ok(format!("<p>original content of {}</p>", id))
    }
}
