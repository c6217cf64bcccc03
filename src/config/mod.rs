// Configuration module entry point
// Loads the immutable startup configuration and the shared request state

mod state;
mod types;

use std::net::SocketAddr;

use crate::error::StartupError;

// Re-export public types
pub use state::{AppState, ServedRoot};
pub use types::{
    Config, FilesConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Default config file name (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Prefix for environment overrides, e.g. `NOCACHE_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "NOCACHE";

impl Config {
    /// Load configuration from the default `config.toml`, if present
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional. Environment variables override file values and
    /// every missing key falls back to its serde default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| StartupError::InvalidAddress { addr, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.files.root, ".");
        assert!(cfg.files.directory_listing);
        assert_eq!(cfg.performance.connection_timeout, None);
        assert!(cfg.logging.access_log);
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "0.0.0.0:8000".parse().unwrap()
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("absent");
        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server, ServerConfig::default());
        assert_eq!(cfg.files, FilesConfig::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("server.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[files]\nroot = \"public\"\ndirectory_listing = false\n",
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.files.root, "public");
        assert!(!cfg.files.directory_listing);
        assert_eq!(cfg.files.index_files, FilesConfig::default().index_files);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_address() {
        let mut cfg = Config::default();
        cfg.server.host = "not an ip".to_string();
        assert!(matches!(
            cfg.get_socket_addr(),
            Err(StartupError::InvalidAddress { .. })
        ));
    }
}
