//! Configuration file parser for ~/.config/reflux/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings since they are
//! usually typos.
use crate::sync::filter::{OrderBy, OrderDirection};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `api_token` is masked in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entries requested per page for both the "all" and "unread" lists.
    pub page_size: usize,

    /// Initial sort key.
    pub order_by: OrderBy,

    /// Initial sort direction.
    pub order_direction: OrderDirection,

    /// Mark unread entries as read shortly after opening them.
    pub mark_read_on_open: bool,

    /// Delay before an opened entry is marked as read.
    pub open_delay_ms: u64,

    /// Quiet period after the last keystroke in the search prompt before the
    /// filter is applied.
    pub search_debounce_ms: u64,

    /// Custom keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,

    /// Server URL used when no stored login exists.
    pub server: Option<String>,

    /// API token used when no stored login exists.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 100,
            order_by: OrderBy::default(),
            order_direction: OrderDirection::default(),
            mark_read_on_open: true,
            open_delay_ms: 200,
            search_debounce_ms: 500,
            keybindings: HashMap::new(),
            server: None,
            api_token: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("page_size", &self.page_size)
            .field("order_by", &self.order_by)
            .field("order_direction", &self.order_direction)
            .field("mark_read_on_open", &self.mark_read_on_open)
            .field("open_delay_ms", &self.open_delay_ms)
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("keybindings", &self.keybindings)
            .field("server", &self.server)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Server-side cap on `limit` for entry listings.
    const MAX_PAGE_SIZE: usize = 1000;

    const KNOWN_KEYS: [&'static str; 9] = [
        "page_size",
        "order_by",
        "order_direction",
        "mark_read_on_open",
        "open_delay_ms",
        "search_debounce_ms",
        "keybindings",
        "server",
        "api_token",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(
            page_size = config.page_size,
            open_delay_ms = config.open_delay_ms,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {} (got {})",
                Self::MAX_PAGE_SIZE,
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn open_delay(&self) -> Duration {
        Duration::from_millis(self.open_delay_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.order_by, OrderBy::PublishedAt);
        assert_eq!(config.order_direction, OrderDirection::Desc);
        assert!(config.mark_read_on_open);
        assert_eq!(config.open_delay(), Duration::from_millis(200));
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
        assert!(config.keybindings.is_empty());
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/reflux_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.open_delay_ms, 200);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("page_size = 50\n").unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.open_delay_ms, 200);
        assert!(config.mark_read_on_open);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
page_size = 25
order_by = "created_at"
order_direction = "asc"
mark_read_on_open = false
open_delay_ms = 350
search_debounce_ms = 300
server = "https://rss.example.com"
api_token = "test-token-123"

[keybindings]
quit = "Ctrl+q"
refresh = "F5"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.order_by, OrderBy::CreatedAt);
        assert_eq!(config.order_direction, OrderDirection::Asc);
        assert!(!config.mark_read_on_open);
        assert_eq!(config.open_delay(), Duration::from_millis(350));
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.server.as_deref(), Some("https://rss.example.com"));
        assert_eq!(config.api_token.as_deref(), Some("test-token-123"));
        assert_eq!(
            config.keybindings.get("refresh").map(String::as_str),
            Some("F5")
        );
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("page_size = 10\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("page_size = \"many\"\n").is_err());
        assert!(Config::parse("order_direction = \"sideways\"\n").is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(matches!(
            Config::parse("page_size = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("page_size = 5000\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("reflux_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reads_file() {
        let dir = std::env::temp_dir().join("reflux_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "open_delay_ms = 0\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.open_delay(), Duration::ZERO);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
