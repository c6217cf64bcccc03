// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub http: HttpConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads, CPU cores when unset
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
        }
    }
}

/// Served root configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory exposed over HTTP, relative paths resolve against the working directory
    pub root: String,
    /// Files tried, in order, when a directory is requested
    pub index_files: Vec<String>,
    /// Generate an HTML listing for directories without an index file
    pub directory_listing: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            index_files: vec!["index.html".to_string(), "index.htm".to_string()],
            directory_listing: true,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    /// Upper bound on the request line plus headers, larger heads get a 400
    pub max_head_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "nocache-server".to_string(),
            max_head_size: 65_536,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Whole-connection deadline in seconds, none when unset
    pub connection_timeout: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            access_log: true,
            access_log_format: "common".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}
