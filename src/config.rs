use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_TITLE: &str = "GradAPI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multipart field carrying the uploaded spreadsheet.
pub const UPLOAD_FIELD: &str = "file";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_UPLOAD_DIR: &str = "./data";
const DEFAULT_MODEL_PATH: &str = "model/model.json";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024; // 16 MB

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "gradapi=info,gradapi_lib=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration. Every field can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Working directory for request-scoped upload files.
    pub upload_dir: PathBuf,
    /// Persisted model artifact, loaded once at startup.
    pub model_path: PathBuf,
    /// Lowercase extensions accepted by the upload gatekeeper.
    pub allowed_extensions: BTreeSet<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            allowed_extensions: BTreeSet::from(["xlsx".to_string()]),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `HOST`, `PORT`, `GRADAPI_UPLOAD_DIR`, `GRADAPI_MODEL_PATH`,
    /// `GRADAPI_ALLOWED_EXTENSIONS` (comma separated), `GRADAPI_MAX_UPLOAD_BYTES`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                value: port.clone(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(dir) = lookup("GRADAPI_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("GRADAPI_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("GRADAPI_ALLOWED_EXTENSIONS") {
            let extensions: BTreeSet<String> = raw
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
            if extensions.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "GRADAPI_ALLOWED_EXTENSIONS",
                    value: raw,
                    reason: "at least one extension is required".into(),
                });
            }
            config.allowed_extensions = extensions;
        }
        if let Some(raw) = lookup("GRADAPI_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "GRADAPI_MAX_UPLOAD_BYTES",
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
        }

        Ok(config)
    }

    /// Socket address string the server binds to (`host:port`).
    pub fn bind_addr(&self) -> String {
        match self.host.parse::<std::net::IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}
