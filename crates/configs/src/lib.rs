use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Optional bind address for the `/healthz` + `/metrics` admin listener.
    #[serde(default)]
    pub admin_addr: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4), admin_addr: None }
    }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }

/// Which document store backs the metric collection.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firestore,
    File,
    Memory,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown store backend `{other}` (expected firestore, file or memory)")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firestore => "firestore",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_file_path")]
    pub file_path: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub firestore: FirestoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection: default_collection(),
            file_path: default_file_path(),
            request_timeout_secs: default_request_timeout(),
            firestore: FirestoreConfig::default(),
        }
    }
}

fn default_collection() -> String { "metrics".into() }
fn default_file_path() -> String { "data/metrics.json".into() }
fn default_request_timeout() -> u64 { 30 }

/// Service-account credentials and endpoint for Firestore.
#[derive(Clone, Deserialize, Default)]
pub struct FirestoreConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub emulator_host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self { Self { format: default_log_format() } }
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("emulator_host", &self.emulator_host)
            .finish()
    }
}

fn default_log_format() -> String { "compact".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

/// Source of environment values; lets tests avoid touching the process env.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment; empty values count as unset.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`) if present, otherwise start from
    /// defaults, then apply env overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.apply_env(&ProcessEnv)?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Env values win over file values when set.
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<()> {
        if let Some(host) = env.var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env.var("SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| anyhow!("SERVER_PORT must be a port number, got `{port}`"))?;
        }
        if let Some(w) = env.var("TOKIO_WORKER_THREADS").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.server.worker_threads = Some(w);
        }
        if let Some(backend) = env.var("METRIC_STORE_BACKEND") {
            self.store.backend = StoreBackend::parse(&backend)?;
        }
        let fs = &mut self.store.firestore;
        if let Some(v) = env.var("FIREBASE_PROJECT_ID") { fs.project_id = v; }
        if let Some(v) = env.var("FIREBASE_CLIENT_EMAIL") { fs.client_email = v; }
        if let Some(v) = env.var("FIREBASE_PRIVATE_KEY") { fs.private_key = v; }
        if let Some(v) = env.var("FIRESTORE_EMULATOR_HOST") { fs.emulator_host = Some(v); }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.store.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        if let Some(addr) = &self.admin_addr {
            if addr.trim().is_empty() {
                self.admin_addr = None;
            }
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(anyhow!("store.collection must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("store.request_timeout_secs must be a positive number of seconds"));
        }
        match self.backend {
            StoreBackend::Firestore => self.firestore.validate(),
            StoreBackend::File if self.file_path.trim().is_empty() => {
                Err(anyhow!("store.file_path must be set for the file backend"))
            }
            StoreBackend::File | StoreBackend::Memory => Ok(()),
        }
    }
}

impl FirestoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(anyhow!("firestore project id is empty; set store.firestore.project_id or FIREBASE_PROJECT_ID"));
        }
        if self.emulator_host.is_some() {
            return Ok(());
        }
        if self.client_email.trim().is_empty() {
            return Err(anyhow!("firestore client email is empty; set store.firestore.client_email or FIREBASE_CLIENT_EMAIL"));
        }
        if self.private_key.trim().is_empty() {
            return Err(anyhow!("firestore private key is empty; set store.firestore.private_key or FIREBASE_PRIVATE_KEY"));
        }
        Ok(())
    }
}
