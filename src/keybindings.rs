//! Keybinding registry: maps actions to key events with config overrides.
//!
//! The detail pane has its own context: its bindings are only consulted while
//! the navigator reports the detail pane as focused, so list keys and detail
//! keys never compete for the same event.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    NavDown,
    NavUp,
    OpenEntry,
    ExitDetail,
    ToggleFocus,
    NextEntry,
    PrevEntry,
    JumpNext,
    JumpPrev,
    ToggleRead,
    ToggleStar,
    OpenExternal,
    FetchOriginal,
    OpenMedia,
    LoadMore,
    Refresh,
    MarkAllRead,
    ToggleFilterStatus,
    ToggleOrderDirection,
    CycleOrderBy,
    EnterSearch,
    ExitSearch,
    CommitSearch,
    CycleFilterType,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    ShowHelp,
    ShowAll,
    ShowStarred,
    ShowHistory,
}

impl Action {
    /// Human-readable description for the help screen.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit application",
            Self::NavDown => "Navigate down",
            Self::NavUp => "Navigate up",
            Self::OpenEntry => "Open entry",
            Self::ExitDetail => "Close entry",
            Self::ToggleFocus => "Switch focus between list and entry",
            Self::NextEntry => "Next entry",
            Self::PrevEntry => "Previous entry",
            Self::JumpNext => "Next entry, loading more if needed",
            Self::JumpPrev => "Previous entry",
            Self::ToggleRead => "Toggle read/unread",
            Self::ToggleStar => "Toggle star",
            Self::OpenExternal => "Open link in browser",
            Self::FetchOriginal => "Fetch original article",
            Self::OpenMedia => "Open first image",
            Self::LoadMore => "Load more entries",
            Self::Refresh => "Refresh entries",
            Self::MarkAllRead => "Mark all as read",
            Self::ToggleFilterStatus => "Toggle all/unread",
            Self::ToggleOrderDirection => "Toggle sort direction",
            Self::CycleOrderBy => "Cycle sort field",
            Self::EnterSearch => "Enter search mode",
            Self::ExitSearch => "Exit search mode",
            Self::CommitSearch => "Apply search now",
            Self::CycleFilterType => "Cycle search field",
            Self::ScrollDown => "Scroll down one line",
            Self::ScrollUp => "Scroll up one line",
            Self::PageDown => "Page down",
            Self::PageUp => "Page up",
            Self::ShowHelp => "Show help",
            Self::ShowAll => "Show all entries",
            Self::ShowStarred => "Show starred entries",
            Self::ShowHistory => "Show reading history",
        }
    }
}

// ============================================================================
// Context Enum
// ============================================================================

/// Dispatch context. Determines which bindings are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    EntryList,
    Detail,
    Search,
}

impl Context {
    pub const ALL: [Context; 4] = [
        Context::Global,
        Context::EntryList,
        Context::Detail,
        Context::Search,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Global => "General",
            Self::EntryList => "Entry list",
            Self::Detail => "Entry detail",
            Self::Search => "Search prompt",
        }
    }

    /// When the bindings of this context receive keys.
    pub fn scope(self) -> &'static str {
        match self {
            Self::Global => "everywhere except the search prompt",
            Self::EntryList => "while the list has focus",
            Self::Detail => "only while the detail pane has focus (Tab)",
            Self::Search => "after /",
        }
    }
}

// ============================================================================
// Key Specification
// ============================================================================

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Terminals report `A` as Char('A') + SHIFT; the case already carries it.
    fn normalized(self) -> Self {
        match self.code {
            KeyCode::Char(_) => Self::new(self.code, self.modifiers.difference(KeyModifiers::SHIFT)),
            _ => self,
        }
    }
}

fn parse_named_key(s: &str) -> Option<KeyCode> {
    match s.to_lowercase().as_str() {
        "enter" | "return" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        "pageup" => Some(KeyCode::PageUp),
        "pagedown" => Some(KeyCode::PageDown),
        "backspace" => Some(KeyCode::Backspace),
        "space" => Some(KeyCode::Char(' ')),
        _ => None,
    }
}

/// Parse a key string from config into a KeySpec.
///
/// Supported formats:
/// - Single char: "q", "j", "/"
/// - Named keys: "Enter", "Esc", "Tab", "Up", "Down", "Left", "Right"
/// - Modifier combos: "Ctrl+d", "Ctrl+Right"
/// - Function keys: "F1" through "F12"
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+") {
        let rest = rest.trim();
        if rest.chars().count() == 1 {
            let c = rest.chars().next()?;
            return Some(KeySpec::ctrl(c));
        }
        return parse_named_key(rest).map(|code| KeySpec::new(code, KeyModifiers::CONTROL));
    }

    if let Some(code) = parse_named_key(s) {
        return Some(KeySpec::plain(code));
    }

    if s.starts_with('F') || s.starts_with('f') {
        if let Ok(n) = s[1..].parse::<u8>() {
            if (1..=12).contains(&n) {
                return Some(KeySpec::plain(KeyCode::F(n)));
            }
        }
    }

    if s.chars().count() == 1 {
        let c = s.chars().next()?;
        return Some(KeySpec::plain(KeyCode::Char(c)));
    }

    None
}

/// Format a KeySpec as a human-readable string for the help screen.
fn format_key(key: &KeySpec) -> String {
    let modifier = if key.modifiers.contains(KeyModifiers::CONTROL) {
        "Ctrl+"
    } else {
        ""
    };

    let key_name = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "?".to_string(),
    };

    format!("{}{}", modifier, key_name)
}

// ============================================================================
// Keybinding Registry
// ============================================================================

/// Registry of keybindings, supporting default bindings and config overrides.
///
/// The same key can map to different actions in different contexts; lookups
/// that miss in a specific context fall back to [`Context::Global`].
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// All bindings in registration order, for the help screen.
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::new(),
        };
        registry.register_defaults();
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    fn bind_char(&mut self, context: Context, c: char, action: Action) {
        self.bind(context, KeySpec::plain(KeyCode::Char(c)), action);
    }

    fn register_defaults(&mut self) {
        use Action::*;

        // === Global ===
        self.bind_char(Context::Global, 'q', Quit);
        self.bind_char(Context::Global, '?', ShowHelp);
        self.bind_char(Context::Global, 'r', Refresh);
        self.bind_char(Context::Global, 'A', MarkAllRead);
        self.bind_char(Context::Global, 'u', ToggleFilterStatus);
        self.bind_char(Context::Global, 'o', ToggleOrderDirection);
        self.bind_char(Context::Global, 'O', CycleOrderBy);
        self.bind_char(Context::Global, '/', EnterSearch);
        self.bind_char(Context::Global, '1', ShowAll);
        self.bind_char(Context::Global, '2', ShowStarred);
        self.bind_char(Context::Global, '3', ShowHistory);
        self.bind(Context::Global, KeySpec::plain(KeyCode::Tab), ToggleFocus);

        // === Entry list ===
        self.bind_char(Context::EntryList, 'j', NavDown);
        self.bind(Context::EntryList, KeySpec::plain(KeyCode::Down), NavDown);
        self.bind_char(Context::EntryList, 'k', NavUp);
        self.bind(Context::EntryList, KeySpec::plain(KeyCode::Up), NavUp);
        self.bind(Context::EntryList, KeySpec::plain(KeyCode::Enter), OpenEntry);
        self.bind(Context::EntryList, KeySpec::plain(KeyCode::Esc), ExitDetail);
        self.bind_char(Context::EntryList, 'm', ToggleRead);
        self.bind_char(Context::EntryList, 's', ToggleStar);
        self.bind_char(Context::EntryList, 'b', OpenExternal);
        self.bind_char(Context::EntryList, 'L', LoadMore);

        // === Detail pane (focused) ===
        self.bind(Context::Detail, KeySpec::plain(KeyCode::Esc), ExitDetail);
        self.bind(Context::Detail, KeySpec::plain(KeyCode::Right), NextEntry);
        self.bind(Context::Detail, KeySpec::plain(KeyCode::Left), PrevEntry);
        self.bind(
            Context::Detail,
            KeySpec::new(KeyCode::Right, KeyModifiers::CONTROL),
            JumpNext,
        );
        self.bind(
            Context::Detail,
            KeySpec::new(KeyCode::Left, KeyModifiers::CONTROL),
            JumpPrev,
        );
        self.bind_char(Context::Detail, 'n', NextEntry);
        self.bind_char(Context::Detail, 'p', PrevEntry);
        self.bind_char(Context::Detail, 'N', JumpNext);
        self.bind_char(Context::Detail, 'P', JumpPrev);
        self.bind_char(Context::Detail, 'm', ToggleRead);
        self.bind_char(Context::Detail, 's', ToggleStar);
        self.bind_char(Context::Detail, 'b', OpenExternal);
        self.bind_char(Context::Detail, 'd', FetchOriginal);
        self.bind_char(Context::Detail, 'v', OpenMedia);
        self.bind_char(Context::Detail, 'j', ScrollDown);
        self.bind(Context::Detail, KeySpec::plain(KeyCode::Down), ScrollDown);
        self.bind_char(Context::Detail, 'k', ScrollUp);
        self.bind(Context::Detail, KeySpec::plain(KeyCode::Up), ScrollUp);
        self.bind(Context::Detail, KeySpec::ctrl('d'), PageDown);
        self.bind(Context::Detail, KeySpec::ctrl('u'), PageUp);

        // === Search prompt ===
        self.bind(Context::Search, KeySpec::plain(KeyCode::Esc), ExitSearch);
        self.bind(Context::Search, KeySpec::plain(KeyCode::Enter), CommitSearch);
        self.bind(Context::Search, KeySpec::plain(KeyCode::Tab), CycleFilterType);
    }

    /// Apply user overrides from config keybindings map.
    ///
    /// Keys in the map are action names (e.g., "quit", "toggle_read").
    /// Values are key strings (e.g., "q", "Ctrl+d", "F5").
    ///
    /// Returns a list of warnings for unrecognized action names or unparseable keys.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        // Sorted so that conflicting overrides resolve the same way every run.
        let mut overrides: Vec<_> = overrides.iter().collect();
        overrides.sort();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };

            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            let mut contexts: Vec<Context> = Vec::new();
            for (ctx, _, a) in &self.bindings {
                if *a == action && !contexts.contains(ctx) {
                    contexts.push(*ctx);
                }
            }

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);

            for ctx in contexts {
                self.bind(ctx, key.normalized(), action);
            }

            tracing::info!(
                action = %action_name,
                key = %key_str,
                "Applied keybinding override"
            );
        }

        warnings
    }

    /// Look up the action for a given key in a given context.
    ///
    /// Tries the specific context first, then falls back to Global.
    pub fn action_for_key(
        &self,
        code: KeyCode,
        modifiers: KeyModifiers,
        context: Context,
    ) -> Option<Action> {
        let key = KeySpec::new(code, modifiers).normalized();

        if let Some(&action) = self.lookup.get(&(context, key)) {
            return Some(action);
        }

        if context != Context::Global {
            if let Some(&action) = self.lookup.get(&(Context::Global, key)) {
                return Some(action);
            }
        }

        None
    }

    /// Get all bindings for the help screen.
    ///
    /// Returns (context, key_display_string, action, description) tuples.
    pub fn all_bindings(&self) -> Vec<(Context, String, Action, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), *action, action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an action name string (from config) into an Action enum.
fn parse_action_name(name: &str) -> Option<Action> {
    match name.to_lowercase().as_str() {
        "quit" => Some(Action::Quit),
        "nav_down" | "down" => Some(Action::NavDown),
        "nav_up" | "up" => Some(Action::NavUp),
        "open_entry" | "open" => Some(Action::OpenEntry),
        "exit_detail" | "close" => Some(Action::ExitDetail),
        "toggle_focus" | "focus" => Some(Action::ToggleFocus),
        "next_entry" | "next" => Some(Action::NextEntry),
        "prev_entry" | "previous" | "prev" => Some(Action::PrevEntry),
        "jump_next" => Some(Action::JumpNext),
        "jump_prev" => Some(Action::JumpPrev),
        "toggle_read" | "read" => Some(Action::ToggleRead),
        "toggle_star" | "star" => Some(Action::ToggleStar),
        "open_external" | "browser" => Some(Action::OpenExternal),
        "fetch_original" | "original" => Some(Action::FetchOriginal),
        "open_media" | "media" => Some(Action::OpenMedia),
        "load_more" | "more" => Some(Action::LoadMore),
        "refresh" => Some(Action::Refresh),
        "mark_all_read" => Some(Action::MarkAllRead),
        "toggle_filter_status" | "unread" => Some(Action::ToggleFilterStatus),
        "toggle_order_direction" | "direction" => Some(Action::ToggleOrderDirection),
        "cycle_order_by" | "order" => Some(Action::CycleOrderBy),
        "enter_search" | "search" => Some(Action::EnterSearch),
        "exit_search" => Some(Action::ExitSearch),
        "commit_search" => Some(Action::CommitSearch),
        "cycle_filter_type" => Some(Action::CycleFilterType),
        "scroll_down" => Some(Action::ScrollDown),
        "scroll_up" => Some(Action::ScrollUp),
        "page_down" => Some(Action::PageDown),
        "page_up" => Some(Action::PageUp),
        "show_help" | "help" => Some(Action::ShowHelp),
        "show_all" | "all" => Some(Action::ShowAll),
        "show_starred" | "starred" => Some(Action::ShowStarred),
        "show_history" | "history" => Some(Action::ShowHistory),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
