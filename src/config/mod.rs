// Configuration module entry point
// Layers defaults, config file, environment and command-line flags

mod cli;
mod state;
mod types;

use std::net::{SocketAddr, ToSocketAddrs};

pub use cli::Cli;
pub use state::AppState;
pub use types::{ArchiveConfig, Config, StorageConfig};

const ENV_PREFIX: &str = "TARSERVE";

impl Config {
    /// Load configuration for the given command line
    ///
    /// Precedence, lowest first: built-in defaults, config file (optional),
    /// `TARSERVE_*` environment variables, command-line flags.
    pub fn load(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.listen", ":8080")?
            .set_default("server.backlog", 128)?
            .set_default("storage.directory", "")?
            .set_default("storage.temp_prefix", "files")?
            .set_default("storage.dir_mode", 0o766)?
            .set_default("storage.sync_on_close", true)?
            .set_default("archive.chunk_size", 65_536)?
            .set_default("archive.channel_capacity", 8)?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.shutdown_grace", 5)?;

        if !cli.config.as_os_str().is_empty() {
            builder = builder.add_source(
                config::File::with_name(&cli.config.to_string_lossy()).required(false),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.listen", cli.listen.clone())?
            .set_override_option("storage.directory", cli.directory.clone())?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.archive.chunk_size == 0 {
            return Err(config::ConfigError::Message(
                "archive.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.archive.channel_capacity == 0 {
            return Err(config::ConfigError::Message(
                "archive.channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the listen address
    ///
    /// `:8080` binds all interfaces (IPv6 dual-stack); host names are
    /// resolved and the first address wins.
    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        let listen = self.server.listen.trim();
        let listen = if listen.starts_with(':') {
            format!("[::]{listen}")
        } else {
            listen.to_string()
        };

        listen
            .to_socket_addrs()
            .map_err(|e| format!("Invalid listen address '{listen}': {e}"))?
            .next()
            .ok_or_else(|| format!("Listen address '{listen}' resolved to nothing"))
    }
}
