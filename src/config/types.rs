// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub archive: ArchiveConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address, `host:port` or `:port` for all interfaces
    pub listen: String,
    pub workers: Option<usize>,
    /// Pending connection queue length
    pub backlog: i32,
}

/// Store root configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Store root; empty means a temporary directory removed at shutdown
    pub directory: String,
    /// Name prefix of the temporary store root
    pub temp_prefix: String,
    /// Permission bits for directories created by uploads (Unix only)
    pub dir_mode: u32,
    /// Upload size limit in bytes, unbounded when not set
    #[serde(default)]
    pub max_upload_size: Option<u64>,
    /// Call fsync before reporting an upload as stored
    ///
    /// Dropping a file discards the result of `close(2)`, so deferred write
    /// errors only reach the client through this fsync.
    pub sync_on_close: bool,
}

/// Archive streaming configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Bytes per response body frame
    pub chunk_size: usize,
    /// Frames buffered between the walk and the connection
    pub channel_capacity: usize,
    /// Archive size limit in bytes, unbounded when not set
    #[serde(default)]
    pub max_archive_size: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (common, combined or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Whole-connection timeout in seconds, none when not set
    #[serde(default)]
    pub connection_timeout: Option<u64>,
    #[serde(default)]
    pub max_connections: Option<u64>,
    /// Seconds in-flight connections get to finish after shutdown starts
    pub shutdown_grace: u64,
}
