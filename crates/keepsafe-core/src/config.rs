use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var that overrides `auth.token_secret`
pub const TOKEN_SECRET_ENV: &str = "KEEPSAFE_TOKEN_SECRET";

/// Top-level configuration (loaded from keepsafe.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsafeConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub blobs: BlobConfig,
    pub auth: AuthConfig,
    pub client: ClientConfig,
    /// Warn if the config file is world-readable (default: true)
    #[serde(default = "default_true")]
    pub config_file_mode_check: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address for gRPC (default: 127.0.0.1:3200)
    pub listen: String,
    /// Prometheus metrics + health endpoint (optional)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL for the metadata store
    pub url: String,
    /// Connection pool size
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Directory holding one ciphertext file per file record
    pub root: PathBuf,
    /// Transport-level retries for blob I/O (0 disables the retry layer)
    pub retries: usize,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Never written back out.
    #[serde(skip_serializing)]
    pub token_secret: Option<SecretString>,
    /// Session token lifetime in seconds (default: 3600)
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl AuthConfig {
    /// Resolve the token secret: env var first, then config file
    pub fn resolve_secret(&self) -> Option<SecretString> {
        std::env::var(TOKEN_SECRET_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
            .or_else(|| {
                self.token_secret
                    .clone()
                    .filter(|s| !s.expose_secret().is_empty())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// gRPC endpoint of keepsafed
    pub server_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3200".into(),
            metrics_addr: None,
            log_level: "info".into(),
            log_format: "json".into(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///var/lib/keepsafe/metadata.db".into(),
            max_connections: 8,
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/keepsafe/files"),
            retries: 3,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: 3600,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "http://127.0.0.1:3200".into(),
        }
    }
}

/// Problem noticed while loading the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No file at the given path; defaults are in use
    NotFound(PathBuf),
    /// The file is readable by other users
    WorldReadable(PathBuf),
}

impl ConfigWarning {
    /// Emit as a `warn` event on the current subscriber
    pub fn log(&self) {
        match self {
            Self::NotFound(path) => tracing::warn!(
                path = %path.display(),
                "config file not found (using defaults)"
            ),
            Self::WorldReadable(path) => tracing::warn!(
                path = %path.display(),
                "config file is world-readable and may contain the token secret; chmod 600 it"
            ),
        }
    }
}

impl KeepsafeConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let (config, warnings) = Self::load_deferred(path)?;
        for w in &warnings {
            w.log();
        }
        Ok(config)
    }

    /// Like [`load`](Self::load) but hands the warnings back instead of
    /// logging them, for callers that set up logging from the config
    pub fn load_deferred(path: &Path) -> anyhow::Result<(Self, Vec<ConfigWarning>)> {
        if !path.exists() {
            return Ok((Self::default(), vec![ConfigWarning::NotFound(path.to_path_buf())]));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;

        let mut warnings = Vec::new();
        if config.config_file_mode_check && is_world_readable(path) {
            warnings.push(ConfigWarning::WorldReadable(path.to_path_buf()));
        }
        Ok((config, warnings))
    }
}

#[cfg(unix)]
fn is_world_readable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o004 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_world_readable(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
config_file_mode_check = false

[server]
listen = "0.0.0.0:4000"
metrics_addr = "127.0.0.1:9200"
log_level = "debug"
log_format = "text"

[database]
url = "sqlite:///tmp/keepsafe.db"
max_connections = 2

[blobs]
root = "/srv/keepsafe/files"
retries = 0

[auth]
token_secret = "s3cr3t"
token_ttl_secs = 600

[client]
server_addr = "http://vault.example.com:4000"
"#;
        let config: KeepsafeConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:4000");
        assert_eq!(config.server.metrics_addr.as_deref(), Some("127.0.0.1:9200"));
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.database.url, "sqlite:///tmp/keepsafe.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.blobs.root, PathBuf::from("/srv/keepsafe/files"));
        assert_eq!(config.blobs.retries, 0);
        assert_eq!(
            config.auth.token_secret.as_ref().map(|s| s.expose_secret()),
            Some("s3cr3t")
        );
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.client.server_addr, "http://vault.example.com:4000");
        assert!(!config.config_file_mode_check);
    }

    #[test]
    fn test_parse_defaults() {
        let config: KeepsafeConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:3200");
        assert!(config.server.metrics_addr.is_none());
        assert_eq!(config.server.log_format, "json");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.blobs.root, PathBuf::from("/var/lib/keepsafe/files"));
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!(config.config_file_mode_check);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[blobs]
root = "./files"
"#;
        let config: KeepsafeConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.blobs.root, PathBuf::from("./files"));
        // Defaults
        assert_eq!(config.blobs.retries, 3);
        assert_eq!(config.server.listen, "127.0.0.1:3200");
    }

    #[test]
    fn test_serialize_omits_token_secret() {
        let mut config = KeepsafeConfig::default();
        config.auth.token_secret = Some(SecretString::from("do-not-print"));
        let toml_str = toml::to_string(&config).unwrap();
        assert!(!toml_str.contains("do-not-print"));
        assert!(!format!("{config:?}").contains("do-not-print"));

        let parsed: KeepsafeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.listen, config.server.listen);
        assert_eq!(parsed.auth.token_ttl_secs, config.auth.token_ttl_secs);
    }

    #[test]
    fn test_resolve_secret_from_file() {
        // The env override is exercised by the daemon; keep this test
        // independent of process environment.
        if std::env::var(TOKEN_SECRET_ENV).is_ok() {
            return;
        }
        let auth = AuthConfig {
            token_secret: Some(SecretString::from("from-file")),
            token_ttl_secs: 60,
        };
        let secret = auth.resolve_secret().unwrap();
        assert_eq!(secret.expose_secret(), "from-file");

        let empty = AuthConfig {
            token_secret: Some(SecretString::from("")),
            ..Default::default()
        };
        assert!(empty.resolve_secret().is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = KeepsafeConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3200");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[server\nlisten = ").unwrap();
        let err = KeepsafeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_load_deferred_reports_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let (config, warnings) = KeepsafeConfig::load_deferred(&path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3200");
        assert_eq!(warnings, vec![ConfigWarning::NotFound(path)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_deferred_reports_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("keepsafe.toml");
        std::fs::write(&path, "[server]\nlog_level = \"debug\"\n").unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let (config, warnings) = KeepsafeConfig::load_deferred(&path).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(warnings, vec![ConfigWarning::WorldReadable(path.clone())]);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        let (_, warnings) = KeepsafeConfig::load_deferred(&path).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_config_warning_is_logged() {
        let logs = capture_logs(|| {
            ConfigWarning::NotFound(PathBuf::from("/nope/keepsafe.toml")).log();
            ConfigWarning::WorldReadable(PathBuf::from("/etc/keepsafe.toml")).log();
        });
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("config file not found"), "{logs}");
        assert!(logs.contains("/nope/keepsafe.toml"), "{logs}");
        assert!(logs.contains("world-readable"), "{logs}");
    }

    #[test]
    fn test_load_logs_missing_file_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let logs = capture_logs(|| {
            KeepsafeConfig::load(&path).unwrap();
        });
        assert!(logs.contains("config file not found"), "{logs}");
    }
}
