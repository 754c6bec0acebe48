use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use secrecy::ExposeSecret;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use reflux::api::{EntryContext, MinifluxClient};
use reflux::app::{App, AppEvent};
use reflux::auth::{read_password, Credentials, FileAuthStore, FileSession};
use reflux::config::Config;
use reflux::ui;

/// Get the config directory path (~/.config/reflux/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("reflux");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "reflux", about = "Terminal client for Miniflux feed readers")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    view: ViewArgs,
}

#[derive(ClapArgs, Debug, Default)]
#[group(multiple = false)]
struct ViewArgs {
    /// Show entries of a single feed
    #[arg(long, value_name = "ID")]
    feed: Option<i64>,

    /// Show entries of a single category
    #[arg(long, value_name = "ID")]
    category: Option<i64>,

    /// Show starred entries
    #[arg(long)]
    starred: bool,

    /// Show recently read entries
    #[arg(long)]
    history: bool,
}

impl ViewArgs {
    fn context(&self) -> EntryContext {
        if let Some(id) = self.feed {
            EntryContext::Feed(id)
        } else if let Some(id) = self.category {
            EntryContext::Category(id)
        } else if self.starred {
            EntryContext::Starred
        } else if self.history {
            EntryContext::History
        } else {
            EntryContext::All
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store credentials for a server after checking them
    Login {
        /// Server URL, e.g. https://reader.example.com
        #[arg(long)]
        server: String,

        /// API token (Settings > API Keys)
        #[arg(long, conflicts_with_all = ["username", "password"])]
        token: Option<String>,

        /// Username for basic authentication
        #[arg(long, required_unless_present = "token")]
        username: Option<String>,

        /// Password for basic authentication (prompted without echo when
        /// omitted; prefer --token)
        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Remove stored credentials
    Logout,
}

/// Read a single line from stdin after printing `prompt` to stderr. Used for
/// piped input, where there is no terminal echo to turn off.
fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn login(
    store: &FileAuthStore,
    server: String,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let creds = match (token, username) {
        (Some(token), _) => Credentials::with_token(server, token),
        (None, Some(username)) => {
            let password = match password {
                Some(p) => p,
                None if std::io::stdin().is_terminal() => read_password("Password: ")?
                    .expose_secret()
                    .to_string(),
                None => prompt_line("Password: ")?,
            };
            Credentials::with_password(server, username, password)
        }
        (None, None) => anyhow::bail!("Either --token or --username is required"),
    };
    creds.validate()?;

    let client = MinifluxClient::new(&creds)?;
    let user = client
        .verify_login()
        .await
        .with_context(|| format!("Login to {} failed", creds.server))?;

    store.save(&creds).context("Failed to store credentials")?;
    println!("Logged in to {} as {}", creds.server, user);
    Ok(())
}

/// Stored login first, then the server/token pair from the config file.
fn resolve_credentials(store: &FileAuthStore, config: &Config) -> Result<Option<Credentials>> {
    match store.load() {
        Ok(Some(creds)) => return Ok(Some(creds)),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(path = %store.path().display(), error = %e, "Ignoring unreadable credentials file");
        }
    }

    match (&config.server, &config.api_token) {
        (Some(server), Some(token)) => {
            let creds = Credentials::with_token(server.clone(), token.clone());
            creds.validate()?;
            Ok(Some(creds))
        }
        _ => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // Credentials live here, so restrict the directory to the current user
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let auth_store = FileAuthStore::new(config_dir.join("auth.toml"));

    match args.command {
        Some(Command::Login {
            server,
            token,
            username,
            password,
        }) => return login(&auth_store, server, token, username, password).await,
        Some(Command::Logout) => {
            auth_store.clear().context("Failed to remove credentials")?;
            println!("Logged out.");
            return Ok(());
        }
        None => {}
    }

    let config_path = config_dir.join("config.toml");
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let Some(creds) = resolve_credentials(&auth_store, &config)? else {
        eprintln!("Error: Not logged in.");
        eprintln!();
        eprintln!("To get started, log in to your server:");
        eprintln!("  reflux login --server https://reader.example.com --token <API_TOKEN>");
        eprintln!();
        eprintln!(
            "Or set `server` and `api_token` in {}.",
            config_path.display()
        );
        std::process::exit(1);
    };

    let client = MinifluxClient::new(&creds).context("Failed to create API client")?;
    let session = FileSession::new(auth_store);

    let mut app = App::new(
        Arc::new(client),
        Arc::new(session),
        &config,
        args.view.context(),
    );

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::start_refresh(&mut app, &event_tx);

    // Run the TUI
    ui::run(&mut app, event_tx, event_rx).await?;

    if app.session_expired {
        eprintln!("The server rejected your credentials.");
        eprintln!("Run `reflux login` to sign in again.");
        std::process::exit(1);
    }

    Ok(())
}
