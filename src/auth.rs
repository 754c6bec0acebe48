//! Stored login and session invalidation.
//!
//! Credentials live in `~/.config/reflux/auth.toml` (mode 0600). The core
//! never reads the file directly: it only talks to a [`SessionHandler`], which
//! is told when the server rejects our credentials.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to access credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credentials file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to encode credentials: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid credentials: {0}")]
    Invalid(String),

    #[error("Password entry cancelled")]
    Cancelled,
}

// ============================================================================
// Credentials
// ============================================================================

/// Login for one server. Either `token` or `username` + `password` is set.
#[derive(Clone)]
pub struct Credentials {
    pub server: String,
    pub token: Option<SecretString>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl Credentials {
    pub fn with_token(server: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: Some(SecretString::from(token.into())),
            username: None,
            password: None,
        }
    }

    pub fn with_password(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            token: None,
            username: Some(username.into()),
            password: Some(SecretString::from(password.into())),
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.server.trim().is_empty() {
            return Err(AuthError::Invalid("server URL is empty".to_string()));
        }
        let has_token = self
            .token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty());
        let has_password = self.username.as_ref().is_some_and(|u| !u.is_empty())
            && self.password.is_some();
        if !has_token && !has_password {
            return Err(AuthError::Invalid(
                "either a token or a username and password is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// On-disk shape of `auth.toml`.
#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl From<StoredCredentials> for Credentials {
    fn from(stored: StoredCredentials) -> Self {
        Self {
            server: stored.server,
            token: stored.token.map(SecretString::from),
            username: stored.username,
            password: stored.password.map(SecretString::from),
        }
    }
}

impl From<&Credentials> for StoredCredentials {
    fn from(creds: &Credentials) -> Self {
        Self {
            server: creds.server.clone(),
            token: creds.token.as_ref().map(|t| t.expose_secret().to_string()),
            username: creds.username.clone(),
            password: creds
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string()),
        }
    }
}

// ============================================================================
// File Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored login. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<Credentials>, AuthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Io(e)),
        };
        let stored: StoredCredentials = toml::from_str(&content)?;
        let creds = Credentials::from(stored);
        creds.validate()?;
        Ok(Some(creds))
    }

    /// Persist credentials, replacing any previous login atomically.
    pub fn save(&self, creds: &Credentials) -> Result<(), AuthError> {
        creds.validate()?;
        let content = toml::to_string(&StoredCredentials::from(creds))?;
        atomic_write(&self.path, content.as_bytes())?;
        tracing::info!(path = %self.path.display(), server = %creds.server, "Saved credentials");
        Ok(())
    }

    /// Remove the stored login. Removing a missing file is not an error.
    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Removed stored credentials");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Io(e)),
        }
    }
}

/// Write-to-temp-then-rename so the credentials file is never left partial.
fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = (|| -> std::io::Result<()> {
        let mut file = options.open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

// ============================================================================
// Password Prompt
// ============================================================================

/// What a key does to a hidden password prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordKey {
    Pending,
    Submit,
    Cancel,
}

/// Apply one key press to the password being typed.
pub fn password_key(buffer: &mut String, key: &KeyEvent) -> PasswordKey {
    if key.kind == KeyEventKind::Release {
        return PasswordKey::Pending;
    }
    match key.code {
        KeyCode::Enter => PasswordKey::Submit,
        KeyCode::Esc => PasswordKey::Cancel,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            PasswordKey::Cancel
        }
        KeyCode::Backspace => {
            buffer.pop();
            PasswordKey::Pending
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            PasswordKey::Pending
        }
        _ => PasswordKey::Pending,
    }
}

/// Read a password from the terminal with echo off.
pub fn read_password(prompt: &str) -> Result<SecretString, AuthError> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;

    enable_raw_mode()?;
    let mut buffer = String::new();
    let outcome = loop {
        match event::read() {
            Ok(Event::Key(key)) => match password_key(&mut buffer, &key) {
                PasswordKey::Pending => {}
                PasswordKey::Submit => break Ok(()),
                PasswordKey::Cancel => break Err(AuthError::Cancelled),
            },
            Ok(_) => {}
            Err(e) => break Err(AuthError::Io(e)),
        }
    };
    if let Err(e) = disable_raw_mode() {
        tracing::warn!(error = %e, "Failed to restore terminal mode");
    }
    eprintln!();

    outcome.map(|()| SecretString::from(buffer))
}

// ============================================================================
// Session Handler
// ============================================================================

/// Receiver of the process-wide "credentials rejected" signal.
pub trait SessionHandler: Send + Sync {
    /// Forget the current session. Called once per auth failure; repeated
    /// calls must be harmless.
    fn invalidate(&self);

    fn is_invalidated(&self) -> bool;
}

/// Session backed by [`FileAuthStore`]: invalidation deletes `auth.toml`.
pub struct FileSession {
    store: FileAuthStore,
    invalidated: AtomicBool,
}

impl FileSession {
    pub fn new(store: FileAuthStore) -> Self {
        Self {
            store,
            invalidated: AtomicBool::new(false),
        }
    }
}

impl SessionHandler for FileSession {
    fn invalidate(&self) {
        if self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!("Server rejected credentials, clearing stored login");
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to remove stored credentials");
        }
    }

    fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_password_keys_edit_and_submit() {
        let mut buffer = String::new();
        for c in "hunter3".chars() {
            assert_eq!(password_key(&mut buffer, &press(KeyCode::Char(c))), PasswordKey::Pending);
        }
        password_key(&mut buffer, &press(KeyCode::Backspace));
        password_key(&mut buffer, &press(KeyCode::Char('2')));
        assert_eq!(password_key(&mut buffer, &press(KeyCode::Enter)), PasswordKey::Submit);
        assert_eq!(buffer, "hunter2");
    }

    #[test]
    fn test_password_ctrl_c_cancels() {
        let mut buffer = "abc".to_string();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(password_key(&mut buffer, &ctrl_c), PasswordKey::Cancel);
        assert_eq!(password_key(&mut buffer, &press(KeyCode::Esc)), PasswordKey::Cancel);
        assert_eq!(buffer, "abc");
    }

    fn temp_store(name: &str) -> (PathBuf, FileAuthStore) {
        let dir = std::env::temp_dir().join(format!("reflux_auth_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FileAuthStore::new(dir.join("auth.toml"));
        (dir, store)
    }

    #[test]
    fn test_load_missing_is_none() {
        let (dir, store) = temp_store("missing");
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load_token() {
        let (dir, store) = temp_store("token");
        store
            .save(&Credentials::with_token("https://rss.example.com", "abc123"))
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.server, "https://rss.example.com");
        assert_eq!(loaded.token.unwrap().expose_secret(), "abc123");
        assert!(loaded.username.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = temp_store("perms");
        store
            .save(&Credentials::with_password("https://rss.example.com", "bob", "pw"))
            .unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_rejects_missing_secret() {
        let (dir, store) = temp_store("invalid");
        let creds = Credentials {
            server: "https://rss.example.com".to_string(),
            token: None,
            username: Some("bob".to_string()),
            password: None,
        };
        assert!(matches!(store.save(&creds), Err(AuthError::Invalid(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_secrets() {
        let creds = Credentials::with_password("https://rss.example.com", "bob", "hunter2");
        let out = format!("{:?}", creds);
        assert!(!out.contains("hunter2"));
        assert!(out.contains("[REDACTED]"));
        assert!(out.contains("bob"));
    }

    #[test]
    fn test_invalidate_clears_file_once() {
        let (dir, store) = temp_store("invalidate");
        store
            .save(&Credentials::with_token("https://rss.example.com", "abc"))
            .unwrap();
        let path = store.path().to_path_buf();

        let session = FileSession::new(store);
        assert!(!session.is_invalidated());
        session.invalidate();
        assert!(session.is_invalidated());
        assert!(!path.exists());
        session.invalidate();

        std::fs::remove_dir_all(&dir).ok();
    }
}
