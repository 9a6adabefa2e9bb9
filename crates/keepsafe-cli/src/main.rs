//! keepsafe: vault client
//!
//! Commands:
//!   register / login        - create an account or check credentials
//!   list                    - list records (id, kind, metadata)
//!   get <id> [--out-dir]    - decrypt and show a record; files are written to disk
//!   add login|text|card|file
//!   delete <id>
//!   config show             - display current configuration
//!
//! Every command runs in a fresh session: credentials come from flags, env,
//! or an interactive prompt.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keepsafe_cli::payload::{self, Card};
use keepsafe_cli::{GrpcConn, Session};
use keepsafe_core::config::KeepsafeConfig;
use keepsafe_core::{RecordId, RecordType};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "keepsafe",
    version,
    about = "keepsafe vault client",
    long_about = "keepsafe: store credentials, notes, cards and files, encrypted before they leave this machine"
)]
struct Cli {
    /// Path to keepsafe configuration file
    #[arg(long, short = 'c', env = "KEEPSAFE_CONFIG", default_value = "/etc/keepsafe/config.toml")]
    config: PathBuf,

    /// Server address (overrides client.server_addr)
    #[arg(long, env = "KEEPSAFE_SERVER")]
    server: Option<String>,

    /// Log level for client diagnostics
    #[arg(long, env = "KEEPSAFE_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Credentials {
    /// Account login
    #[arg(long, env = "KEEPSAFE_LOGIN")]
    login: Option<String>,

    /// Account password (prompted if absent)
    #[arg(long, env = "KEEPSAFE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Master secret the record key is derived from (prompted if absent)
    #[arg(long, env = "KEEPSAFE_MASTER", hide_env_values = true)]
    master: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new account
    Register {
        #[command(flatten)]
        creds: Credentials,
    },

    /// Check credentials against the server
    Login {
        #[command(flatten)]
        creds: Credentials,
    },

    /// List stored records
    List {
        #[command(flatten)]
        creds: Credentials,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Decrypt and show a record
    Get {
        id: String,
        /// Directory for decrypted files (default: current directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        creds: Credentials,
    },

    /// Add a record
    Add {
        #[command(subcommand)]
        kind: AddKind,
    },

    /// Delete a record
    Delete {
        id: String,
        #[command(flatten)]
        creds: Credentials,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum AddKind {
    /// A login + password pair
    Login {
        /// Login being stored (not the account login)
        #[arg(long)]
        username: String,
        /// Password being stored (prompted if absent)
        #[arg(long)]
        secret: Option<String>,
        #[arg(long, default_value = "")]
        metadata: String,
        #[command(flatten)]
        creds: Credentials,
    },

    /// Free text
    Text {
        text: String,
        #[arg(long, default_value = "")]
        metadata: String,
        #[command(flatten)]
        creds: Credentials,
    },

    /// A payment card
    Card {
        #[arg(long)]
        number: String,
        /// Expiration date (e.g. 12/29)
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        cvc: String,
        #[arg(long, default_value = "")]
        metadata: String,
        #[command(flatten)]
        creds: Credentials,
    },

    /// A local file; its name is stored as metadata
    File {
        path: PathBuf,
        #[command(flatten)]
        creds: Credentials,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = KeepsafeConfig::load(&cli.config)?;
    let server = cli
        .server
        .clone()
        .unwrap_or_else(|| config.client.server_addr.clone());

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Register { creds } => cmd_register(&server, creds).await,
        Commands::Login { creds } => cmd_login(&server, creds).await,
        Commands::List { creds, json } => cmd_list(&server, creds, json).await,
        Commands::Get { id, out_dir, creds } => cmd_get(&server, creds, &id, out_dir.as_deref()).await,
        Commands::Delete { id, creds } => cmd_delete(&server, creds, &id).await,
        Commands::Add { kind } => cmd_add(&server, kind).await,
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Session helpers ───────────────────────────────────────────────────────────

struct Resolved {
    login: String,
    password: SecretString,
    master: SecretString,
}

fn prompt_line(label: &str) -> Result<String> {
    use std::io::Write;
    eprint!("{label}: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .with_context(|| format!("reading {label}"))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_secret(label: &str) -> Result<SecretString> {
    let value = rpassword::prompt_password(format!("{label}: "))
        .with_context(|| format!("reading {label}"))?;
    Ok(SecretString::from(value))
}

fn resolve(creds: Credentials) -> Result<Resolved> {
    let login = match creds.login {
        Some(l) => l,
        None => prompt_line("login")?,
    };
    let password = match creds.password {
        Some(p) => SecretString::from(p),
        None => prompt_secret("password")?,
    };
    let master = match creds.master {
        Some(m) => SecretString::from(m),
        None => prompt_secret("master secret")?,
    };
    Ok(Resolved {
        login,
        password,
        master,
    })
}

async fn open_session(server: &str, creds: Credentials) -> Result<Session<GrpcConn>> {
    let creds = resolve(creds)?;
    let conn = GrpcConn::connect(server).await?;
    let mut session = Session::new(conn);
    session
        .login(&creds.login, &creds.password, &creds.master)
        .await
        .context("login failed")?;
    Ok(session)
}

// ── `keepsafe register` / `keepsafe login` ────────────────────────────────────

async fn cmd_register(server: &str, creds: Credentials) -> Result<()> {
    let creds = resolve(creds)?;
    let conn = GrpcConn::connect(server).await?;
    let mut session = Session::new(conn);
    session
        .register(&creds.login, &creds.password, &creds.master)
        .await
        .context("registration failed")?;
    println!("registered {} at {server}", creds.login);
    Ok(())
}

async fn cmd_login(server: &str, creds: Credentials) -> Result<()> {
    let session = open_session(server, creds).await?;
    let count = session.list().await.context("listing records")?.len();
    println!("login ok: {count} record(s) stored");
    Ok(())
}

// ── `keepsafe list` ───────────────────────────────────────────────────────────

async fn cmd_list(server: &str, creds: Credentials, json: bool) -> Result<()> {
    let session = open_session(server, creds).await?;
    let records = session.list().await.context("listing records")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("serializing record list")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("no records");
        return Ok(());
    }
    for r in &records {
        let metadata = if r.metadata.is_empty() {
            "no metadata"
        } else {
            r.metadata.as_str()
        };
        println!("{}  {} | {}", r.id, r.record_type, metadata);
    }
    Ok(())
}

// ── `keepsafe get` ────────────────────────────────────────────────────────────

async fn cmd_get(server: &str, creds: Credentials, id: &str, out_dir: Option<&Path>) -> Result<()> {
    let session = open_session(server, creds).await?;
    let record = session
        .get(&RecordId::new(id))
        .await
        .with_context(|| format!("fetching record {id}"))?;

    if record.record_type == RecordType::File {
        let dest = file_destination(out_dir.unwrap_or(Path::new(".")), &record.metadata, id);
        tokio::fs::write(&dest, &record.payload)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
        print!("{}", payload::render(&record));
        println!("written: {}", dest.display());
    } else {
        print!("{}", payload::render(&record));
    }
    Ok(())
}

/// Only the final path component of the stored name is honoured
fn file_destination(dir: &Path, metadata: &str, id: &str) -> PathBuf {
    let name = Path::new(metadata)
        .file_name()
        .map(|n| n.to_owned())
        .unwrap_or_else(|| id.into());
    dir.join(name)
}

// ── `keepsafe add` ────────────────────────────────────────────────────────────

async fn cmd_add(server: &str, kind: AddKind) -> Result<()> {
    let (creds, record_type, metadata, plaintext) = match kind {
        AddKind::Login {
            username,
            secret,
            metadata,
            creds,
        } => {
            let secret = match secret {
                Some(s) => s,
                None => {
                    use secrecy::ExposeSecret;
                    prompt_secret("stored password")?.expose_secret().to_string()
                }
            };
            (
                creds,
                RecordType::LoginPassword,
                metadata,
                payload::encode_login_password(&username, &secret)?,
            )
        }
        AddKind::Text { text, metadata, creds } => (creds, RecordType::Text, metadata, text.into_bytes()),
        AddKind::Card {
            number,
            expiry,
            cvc,
            metadata,
            creds,
        } => {
            let card = Card { number, expiry, cvc };
            (creds, RecordType::CreditCard, metadata, card.encode()?)
        }
        AddKind::File { path, creds } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", path.display()))?;
            (creds, RecordType::File, name, bytes)
        }
    };

    let session = open_session(server, creds).await?;
    let id = session
        .create(record_type, &metadata, &plaintext)
        .await
        .context("storing record")?;
    println!("stored {record_type}: {id}");
    Ok(())
}

// ── `keepsafe delete` ─────────────────────────────────────────────────────────

async fn cmd_delete(server: &str, creds: Credentials, id: &str) -> Result<()> {
    let session = open_session(server, creds).await?;
    session
        .delete(&RecordId::new(id))
        .await
        .with_context(|| format!("deleting record {id}"))?;
    println!("deleted {id}");
    Ok(())
}

// ── `keepsafe config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &KeepsafeConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_file_destination_strips_directories() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            file_destination(dir, "../../etc/passwd", "id1"),
            PathBuf::from("/tmp/out/passwd")
        );
        assert_eq!(
            file_destination(dir, "", "id1"),
            PathBuf::from("/tmp/out/id1")
        );
    }

    #[test]
    fn test_add_card_args() {
        let cli = Cli::try_parse_from([
            "keepsafe", "add", "card", "--number", "4111", "--expiry", "12/29", "--cvc", "123",
            "--login", "alice", "--password", "pw", "--master", "m",
        ])
        .unwrap();
        match cli.command {
            Commands::Add {
                kind: AddKind::Card { number, creds, .. },
            } => {
                assert_eq!(number, "4111");
                assert_eq!(creds.login.as_deref(), Some("alice"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
