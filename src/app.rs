use crate::api::{ApiError, EntryContext, EntrySource};
use crate::auth::SessionHandler;
use crate::config::Config;
use crate::keybindings::KeybindingRegistry;
use crate::nav::{DelayHandle, MarkReadToken, Navigator};
use crate::store::{Entry, EntryId, EntryPage, EntryStore, StoreChange};
use crate::sync::{
    compute_visible, FilterState, FilterType, ListKind, LoadMorePlan, MutationCoordinator,
    MutationRequest, Pagination, RefreshResponse,
};
use lru::LruCache;
use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Maximum scroll offset for the detail pane (ratatui u16 limit).
pub const MAX_SCROLL: usize = u16::MAX as usize;

/// Rendered entry bodies kept across frames.
const RENDER_CACHE_SIZE: usize = 64;

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// Event Types
// ============================================================================

/// Events from background tasks.
///
/// Tasks only perform I/O; every state change they imply happens when the
/// event loop handles the event.
#[derive(Debug)]
pub enum AppEvent {
    /// Both lists fetched for a refresh started at `generation`.
    RefreshLoaded {
        generation: u64,
        result: Result<RefreshResponse, ApiError>,
    },
    /// Next page for one list.
    PageLoaded {
        plan: LoadMorePlan,
        result: Result<EntryPage, ApiError>,
    },
    /// A read/starred request settled.
    MutationSettled {
        request: MutationRequest,
        result: Result<(), ApiError>,
    },
    /// Bulk mark-all-read settled for `context`.
    BulkSettled {
        context: EntryContext,
        result: Result<(), ApiError>,
    },
    /// The open-delay timer for an entry fired.
    MarkReadElapsed { token: MarkReadToken },
    /// Original article content fetched from the server.
    OriginalLoaded {
        entry_id: EntryId,
        result: Result<String, ApiError>,
    },
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: Name of the task that panicked (e.g., "refresh", "load_more")
    /// - `error`: The panic message extracted from the panic payload
    TaskPanicked { task: &'static str, error: String },
}

impl AppEvent {
    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshLoaded { .. } => "RefreshLoaded",
            Self::PageLoaded { .. } => "PageLoaded",
            Self::MutationSettled { .. } => "MutationSettled",
            Self::BulkSettled { .. } => "BulkSettled",
            Self::MarkReadElapsed { .. } => "MarkReadElapsed",
            Self::OriginalLoaded { .. } => "OriginalLoaded",
            Self::TaskPanicked { .. } => "TaskPanicked",
        }
    }
}

/// Cache key for a rendered entry body: entry, wrap width, original content.
pub type RenderKey = (EntryId, u16, bool);

// ============================================================================
// Application State
// ============================================================================

/// Central application state.
///
/// Owns the entry store and the sync components; the UI layer borrows them
/// for rendering and drives them from input and background events.
pub struct App {
    pub source: Arc<dyn EntrySource>,
    pub session: Arc<dyn SessionHandler>,

    pub keybindings: KeybindingRegistry,

    // Core state
    pub store: EntryStore,
    pub pagination: Pagination,
    pub mutations: MutationCoordinator,
    pub navigator: Navigator,
    pub filter: FilterState,

    // List
    /// Index into the visible sequence.
    pub selected: usize,

    // Detail pane
    pub detail_scroll: usize,
    /// Last known detail viewport height, excluding borders.
    pub detail_visible_lines: usize,
    /// Original article content replacing the feed content of the open entry.
    pub original_content: Option<(EntryId, Arc<str>)>,
    /// Entry whose original content is being fetched.
    pub original_loading: Option<EntryId>,
    pub render_cache: LruCache<RenderKey, Arc<str>>,

    // Background work
    /// Pending open-delay mark-read. Dropping it cancels the timer.
    pub mark_read_timer: Option<DelayHandle>,
    pub refresh_handle: Option<JoinHandle<()>>,
    pub load_more_handles: Vec<JoinHandle<()>>,
    pub original_handle: Option<JoinHandle<()>>,
    /// Advance to the next entry once the in-flight page arrives.
    pub advance_after_load: bool,

    // Search
    pub search_mode: bool,
    pub search_input: String,
    /// Debounce timer for search
    pub search_debounce: Option<Instant>,
    /// Pending search query
    pub pending_search: Option<String>,
    pub search_debounce_delay: Duration,
    /// Filter text and field in effect when the search prompt opened.
    pub search_origin: Option<(String, FilterType)>,
    /// Whether the detail pane had focus before the search prompt opened.
    pub search_restore_focus: bool,

    // Chrome
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub show_help: bool,
    pub help_scroll_offset: usize,
    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,
    /// Set by the store subscription after every mutation batch.
    store_changed: Arc<AtomicBool>,

    /// The server rejected our credentials; the loop exits.
    pub session_expired: bool,
}

impl App {
    pub fn new(
        source: Arc<dyn EntrySource>,
        session: Arc<dyn SessionHandler>,
        config: &Config,
        context: EntryContext,
    ) -> Self {
        let mut keybindings = KeybindingRegistry::new();
        for warning in keybindings.apply_overrides(&config.keybindings) {
            tracing::warn!(%warning, "Ignoring keybinding override");
        }

        let store_changed = Arc::new(AtomicBool::new(false));
        let mut store = EntryStore::new();
        let flag = Arc::clone(&store_changed);
        store.subscribe(move |change, revision| {
            if matches!(change, StoreChange::Replaced | StoreChange::Cleared) {
                tracing::trace!(revision, ?change, "Store contents replaced");
            }
            flag.store(true, Ordering::Relaxed);
        });

        Self {
            source,
            session,
            keybindings,
            store,
            pagination: Pagination::new(context, config.page_size),
            mutations: MutationCoordinator::new(),
            navigator: Navigator::new(config.open_delay(), config.mark_read_on_open),
            filter: FilterState::with_order(config.order_by, config.order_direction),
            selected: 0,
            detail_scroll: 0,
            detail_visible_lines: 0,
            original_content: None,
            original_loading: None,
            render_cache: LruCache::new(
                NonZeroUsize::new(RENDER_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            ),
            mark_read_timer: None,
            refresh_handle: None,
            load_more_handles: Vec::new(),
            original_handle: None,
            advance_after_load: false,
            search_mode: false,
            search_input: String::new(),
            search_debounce: None,
            pending_search: None,
            search_debounce_delay: config.search_debounce(),
            search_origin: None,
            search_restore_focus: false,
            status_message: None,
            show_help: false,
            help_scroll_offset: 0,
            needs_redraw: true,
            store_changed,
            session_expired: false,
        }
    }

    // ------------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------------

    /// List backing the visible sequence, chosen by the filter status.
    pub fn list_kind(&self) -> ListKind {
        ListKind::from(self.filter.filter_status)
    }

    /// The filtered, sorted sequence currently on screen.
    pub fn visible(&self) -> Vec<&Entry> {
        compute_visible(
            self.pagination.entries(self.list_kind(), &self.store),
            &self.filter,
        )
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.visible().get(self.selected).copied()
    }

    /// Entry open in the detail pane.
    pub fn active_entry(&self) -> Option<&Entry> {
        self.navigator
            .active_entry()
            .and_then(|id| self.store.get(id))
    }

    /// Whether another page of the visible list can be requested now.
    pub fn can_load_more(&self) -> bool {
        let list = self.pagination.list(self.list_kind());
        list.load_more_visible() && !list.is_loading() && !self.pagination.is_refreshing()
    }

    /// Consume the store's change flag.
    pub fn take_store_changed(&self) -> bool {
        self.store_changed.swap(false, Ordering::Relaxed)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn nav_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn nav_down(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.selected = self.selected.saturating_add(1).min(len - 1);
        }
    }

    /// Whether the selection sits on the last visible entry.
    pub fn at_list_end(&self) -> bool {
        let len = self.visible().len();
        len == 0 || self.selected + 1 >= len
    }

    /// Move the selection onto `id` if it is visible.
    pub fn select_entry(&mut self, id: EntryId) {
        if let Some(pos) = self.visible().iter().position(|e| e.id == id) {
            self.selected = pos;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.selected = 0;
    }

    pub fn clamp_selection(&mut self) {
        let len = self.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    // ------------------------------------------------------------------------
    // Detail pane
    // ------------------------------------------------------------------------

    pub fn scroll_up(&mut self, lines: usize) {
        self.detail_scroll = self.detail_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.detail_scroll = self.detail_scroll.saturating_add(lines).min(MAX_SCROLL);
    }

    /// Forget per-entry detail state when a different entry opens or the
    /// pane closes.
    pub fn reset_detail(&mut self) {
        self.detail_scroll = 0;
        self.original_content = None;
        self.original_loading = None;
        if let Some(handle) = self.original_handle.take() {
            handle.abort();
            tracing::debug!("Aborted original content fetch");
        }
    }

    /// Original content for `id`, if it was fetched.
    pub fn original_for(&self, id: EntryId) -> Option<&Arc<str>> {
        match &self.original_content {
            Some((entry_id, content)) if *entry_id == id => Some(content),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    /// Abort in-flight page loads. Their generation is already stale.
    pub fn abort_page_loads(&mut self) {
        for handle in self.load_more_handles.drain(..) {
            handle.abort();
        }
        self.advance_after_load = false;
    }

    pub fn cancel_mark_read(&mut self) {
        if let Some(timer) = self.mark_read_timer.take() {
            timer.cancel();
            tracing::debug!("Cancelled pending mark-read");
        }
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired.
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Surface a failed request. Auth failures also invalidate the session.
    pub fn report_error(&mut self, what: &str, err: &ApiError) {
        tracing::warn!(error = %err, what, "Request failed");
        self.set_status(format!("{}: {}", what, err.user_message()));
        if err.is_auth() {
            self.session.invalidate();
            self.session_expired = true;
        }
    }
}

// ============================================================================
// Resource Cleanup
// ============================================================================

/// Abort all in-flight async tasks on App drop.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.original_handle.take() {
            handle.abort();
        }
        for handle in self.load_more_handles.drain(..) {
            handle.abort();
        }
        self.mark_read_timer = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::fake::FakeSource;
    use crate::store::{test_entry, EntryStatus};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{self, Duration};

    /// Session handler that only records invalidations.
    #[derive(Default)]
    pub(crate) struct RecordingSession {
        pub(crate) invalidations: AtomicUsize,
    }

    impl SessionHandler for RecordingSession {
        fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }

        fn is_invalidated(&self) -> bool {
            self.invalidations.load(Ordering::SeqCst) > 0
        }
    }

    pub(crate) fn test_app_with(source: Arc<FakeSource>, session: Arc<RecordingSession>) -> App {
        App::new(source, session, &Config::default(), EntryContext::All)
    }

    fn test_app() -> App {
        test_app_with(
            Arc::new(FakeSource::default()),
            Arc::new(RecordingSession::default()),
        )
    }

    #[tokio::test]
    async fn test_nav_empty_list() {
        let mut app = test_app();
        assert!(app.selected_entry().is_none());
        app.nav_down();
        assert_eq!(app.selected, 0);
        assert!(app.at_list_end());
    }

    #[tokio::test]
    async fn test_scroll_up_at_zero() {
        let mut app = test_app();
        app.scroll_up(1);
        assert_eq!(app.detail_scroll, 0);
        app.scroll_down(3);
        assert_eq!(app.detail_scroll, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_expires_after_3_seconds() {
        let mut app = test_app();
        app.set_status("Test message");

        time::advance(Duration::from_secs(2)).await;
        assert!(!app.clear_expired_status());
        assert!(app.status_message.is_some());

        time::advance(Duration::from_secs(2)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_store_changes_flag_redraw() {
        let mut app = test_app();
        assert!(!app.take_store_changed());
        app.store.upsert_many(vec![test_entry(1, EntryStatus::Unread)]);
        assert!(app.take_store_changed());
        assert!(!app.take_store_changed());
    }

    #[tokio::test]
    async fn test_auth_error_invalidates_session() {
        let session = Arc::new(RecordingSession::default());
        let mut app = test_app_with(Arc::new(FakeSource::default()), session.clone());

        app.report_error("Refresh failed", &ApiError::transport("boom"));
        assert!(!app.session_expired);
        assert!(!session.is_invalidated());

        app.report_error(
            "Refresh failed",
            &ApiError::Auth {
                message: "Access Unauthorized".to_string(),
            },
        );
        assert!(app.session_expired);
        assert!(session.is_invalidated());
    }

    #[tokio::test]
    async fn test_config_keybinding_overrides_applied_to_app() {
        use crate::keybindings::{Action, Context};
        use crossterm::event::{KeyCode, KeyModifiers};

        let mut config = Config::default();
        config
            .keybindings
            .insert("toggle_read".to_string(), "x".to_string());
        let app = App::new(
            Arc::new(FakeSource::default()),
            Arc::new(RecordingSession::default()),
            &config,
            EntryContext::All,
        );
        assert_eq!(
            app.keybindings
                .action_for_key(KeyCode::Char('x'), KeyModifiers::NONE, Context::Detail),
            Some(Action::ToggleRead)
        );
    }
}
