//! Keyboard navigation over the visible entry sequence.
//!
//! The [`Navigator`] is a pure state machine. Each operation returns the
//! [`NavEffect`]s the caller must execute; it never touches the store or the
//! network. The detail key listener is owned by the `Viewing` state: it is
//! registered when the detail pane gains focus and dropped on every exit
//! path, so at most one exists at a time.

mod delay;

pub use delay::DelayHandle;

use crate::store::{Entry, EntryId, EntryStatus};
use std::time::Duration;

/// Registration of the detail-pane key listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

/// Identifies one scheduled mark-read timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkReadToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Viewing {
        entry_id: EntryId,
        detail_focused: bool,
        /// Present exactly when `detail_focused` is true.
        listener: Option<ListenerToken>,
    },
}

/// Side effect requested by a navigation transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEffect {
    ScheduleMarkRead {
        entry_id: EntryId,
        token: MarkReadToken,
        delay: Duration,
    },
    CancelMarkRead {
        token: MarkReadToken,
    },
    /// Load the next page, then advance past the current last entry.
    LoadMoreThenAdvance,
    ToggleRead(EntryId),
    ToggleStar(EntryId),
    OpenExternal(EntryId),
    FetchOriginal(EntryId),
    OpenMedia(EntryId),
    ScrollDetailTop,
}

#[derive(Debug)]
pub struct Navigator {
    state: NavState,
    open_delay: Duration,
    mark_read_on_open: bool,
    pending_mark: Option<MarkReadToken>,
    next_token: u64,
}

impl Navigator {
    pub fn new(open_delay: Duration, mark_read_on_open: bool) -> Self {
        Self {
            state: NavState::Idle,
            open_delay,
            mark_read_on_open,
            pending_mark: None,
            next_token: 0,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn active_entry(&self) -> Option<EntryId> {
        match self.state {
            NavState::Viewing { entry_id, .. } => Some(entry_id),
            NavState::Idle => None,
        }
    }

    pub fn is_detail_focused(&self) -> bool {
        matches!(
            self.state,
            NavState::Viewing {
                detail_focused: true,
                ..
            }
        )
    }

    pub fn listener(&self) -> Option<ListenerToken> {
        match self.state {
            NavState::Viewing { listener, .. } => listener,
            NavState::Idle => None,
        }
    }

    pub fn pending_mark_read(&self) -> Option<MarkReadToken> {
        self.pending_mark
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Idle/Viewing → Viewing(entry). Unread entries get a delayed mark-read.
    pub fn open(&mut self, entry_id: EntryId, status: EntryStatus) -> Vec<NavEffect> {
        let mut effects = self.cancel_pending();
        let listener = self.token();
        self.state = NavState::Viewing {
            entry_id,
            detail_focused: true,
            listener: Some(ListenerToken(listener)),
        };
        effects.push(NavEffect::ScrollDetailTop);

        if self.mark_read_on_open && status.is_unread() {
            let token = MarkReadToken(self.token());
            self.pending_mark = Some(token);
            effects.push(NavEffect::ScheduleMarkRead {
                entry_id,
                token,
                delay: self.open_delay,
            });
        }
        effects
    }

    /// Viewing → Idle.
    pub fn escape(&mut self) -> Vec<NavEffect> {
        if self.state == NavState::Idle {
            return Vec::new();
        }
        let effects = self.cancel_pending();
        self.state = NavState::Idle;
        effects
    }

    /// Move to the following entry of `visible`.
    ///
    /// At the end of the sequence this is a no-op unless `jump` is set and
    /// another page can be loaded.
    pub fn next(&mut self, visible: &[&Entry], jump: bool, can_load_more: bool) -> Vec<NavEffect> {
        let Some(pos) = self.focused_position(visible) else {
            return Vec::new();
        };
        match visible.get(pos + 1) {
            Some(entry) => self.open(entry.id, entry.status),
            None if jump && can_load_more => vec![NavEffect::LoadMoreThenAdvance],
            None => Vec::new(),
        }
    }

    /// Move to the preceding entry of `visible`. No-op at the start.
    pub fn previous(&mut self, visible: &[&Entry]) -> Vec<NavEffect> {
        let Some(pos) = self.focused_position(visible) else {
            return Vec::new();
        };
        match pos.checked_sub(1).and_then(|p| visible.get(p)) {
            Some(entry) => self.open(entry.id, entry.status),
            None => Vec::new(),
        }
    }

    /// Detach the key listener while keeping the entry open (e.g. while the
    /// search prompt has focus).
    pub fn blur(&mut self) {
        if let NavState::Viewing {
            entry_id,
            detail_focused: true,
            ..
        } = self.state
        {
            self.state = NavState::Viewing {
                entry_id,
                detail_focused: false,
                listener: None,
            };
        }
    }

    /// Re-attach the key listener to the open entry.
    pub fn focus(&mut self) {
        if let NavState::Viewing {
            entry_id,
            detail_focused: false,
            ..
        } = self.state
        {
            let listener = ListenerToken(self.token());
            self.state = NavState::Viewing {
                entry_id,
                detail_focused: true,
                listener: Some(listener),
            };
        }
    }

    pub fn toggle_read(&self) -> Vec<NavEffect> {
        self.on_focused(NavEffect::ToggleRead)
    }

    pub fn toggle_star(&self) -> Vec<NavEffect> {
        self.on_focused(NavEffect::ToggleStar)
    }

    pub fn open_external(&self) -> Vec<NavEffect> {
        self.on_focused(NavEffect::OpenExternal)
    }

    pub fn open_original(&self) -> Vec<NavEffect> {
        self.on_focused(NavEffect::FetchOriginal)
    }

    pub fn open_media(&self) -> Vec<NavEffect> {
        self.on_focused(NavEffect::OpenMedia)
    }

    /// A mark-read timer fired. Returns the entry to mark, or `None` if the
    /// timer was superseded (stale token).
    pub fn mark_read_elapsed(&mut self, token: MarkReadToken) -> Option<EntryId> {
        if self.pending_mark != Some(token) {
            tracing::debug!(token = token.0, "Ignoring stale mark-read timer");
            return None;
        }
        self.pending_mark = None;
        self.active_entry()
    }

    /// The active entry disappeared from the list (refresh, context switch).
    pub fn reset(&mut self) -> Vec<NavEffect> {
        self.escape()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn cancel_pending(&mut self) -> Vec<NavEffect> {
        match self.pending_mark.take() {
            Some(token) => vec![NavEffect::CancelMarkRead { token }],
            None => Vec::new(),
        }
    }

    fn focused_position(&self, visible: &[&Entry]) -> Option<usize> {
        match self.state {
            NavState::Viewing {
                entry_id,
                detail_focused: true,
                ..
            } => visible.iter().position(|e| e.id == entry_id),
            _ => None,
        }
    }

    fn on_focused(&self, effect: fn(EntryId) -> NavEffect) -> Vec<NavEffect> {
        match self.state {
            NavState::Viewing {
                entry_id,
                detail_focused: true,
                ..
            } => vec![effect(entry_id)],
            _ => Vec::new(),
        }
    }
}
