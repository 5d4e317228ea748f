use std::env;
use std::time::Duration;

/// Which object store implementation backs the file registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Any S3-compatible endpoint (AWS S3, MinIO, gateways)
    S3,
    /// Process-local store, contents are lost on restart
    Memory,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "s3" | "minio" => Some(Self::S3),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Memory => "memory",
        }
    }
}

/// Object store connection settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend type (default: s3)
    pub backend: StorageBackend,

    /// Custom endpoint URL; `None` uses the provider's default endpoint
    pub endpoint: Option<String>,

    /// Region (default: "us-east-1")
    pub region: String,

    /// Static access key. When either key is missing the default
    /// credential provider chain is used instead.
    pub access_key: Option<String>,

    pub secret_key: Option<String>,

    /// Container (bucket) holding every stored file (default: "files")
    pub container: String,

    /// Path-style addressing, required by MinIO (default: true)
    pub force_path_style: bool,

    /// Create the container at startup when it does not exist (default: false)
    pub create_container: bool,

    /// Per-operation timeout for backend calls in seconds, 0 disables (default: 30)
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            container: "files".to_string(),
            force_path_style: true,
            create_container: false,
            timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: "0.0.0.0")
    pub host: String,

    /// Listen port (default: 3000)
    pub port: u16,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Deadline in seconds for the storage work of one file operation,
    /// 0 disables (default: 60). Receiving the upload body is not counted.
    pub request_timeout_secs: u64,

    /// Directory holding the presentation bundle (default: "public")
    pub static_dir: String,

    /// Answer deletes of missing keys with not-found instead of
    /// relaying the backend's idempotent success (default: false)
    pub strict_delete: bool,

    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_file_size: 256 * 1024 * 1024, // 256 MB
            request_timeout_secs: 60,
            static_dir: "public".to_string(),
            strict_delete: false,
            storage: StorageConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_var(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| {
        let v = v.trim().to_lowercase();
        v != "false" && v != "0" && v != "no" && !v.is_empty()
    })
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let storage_default = default.storage.clone();

        let storage = StorageConfig {
            backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|v| StorageBackend::parse(&v))
                .unwrap_or(storage_default.backend),
            endpoint: non_empty_var("STORAGE_ENDPOINT"),
            region: non_empty_var("STORAGE_REGION").unwrap_or(storage_default.region),
            access_key: non_empty_var("STORAGE_ACCESS_KEY"),
            secret_key: non_empty_var("STORAGE_SECRET_KEY"),
            container: non_empty_var("STORAGE_CONTAINER").unwrap_or(storage_default.container),
            force_path_style: flag_var("STORAGE_FORCE_PATH_STYLE")
                .unwrap_or(storage_default.force_path_style),
            create_container: flag_var("STORAGE_CREATE_CONTAINER")
                .unwrap_or(storage_default.create_container),
            timeout_secs: parse_var("STORAGE_TIMEOUT_SECS")
                .unwrap_or(storage_default.timeout_secs),
        };

        Self {
            host: non_empty_var("HOST").unwrap_or(default.host),
            port: parse_var("PORT").unwrap_or(default.port),
            max_file_size: parse_var("MAX_FILE_SIZE").unwrap_or(default.max_file_size),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS")
                .unwrap_or(default.request_timeout_secs),
            static_dir: non_empty_var("STATIC_DIR").unwrap_or(default.static_dir),
            strict_delete: flag_var("STRICT_DELETE").unwrap_or(default.strict_delete),
            storage,
        }
    }

    /// Create config for development (in-memory backend, no timeouts)
    pub fn development() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            request_timeout_secs: 0,
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                timeout_secs: 0,
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
