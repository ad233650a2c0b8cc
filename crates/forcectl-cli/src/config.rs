//! Configuration Vault – reads/writes `~/.forcectl/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use forcectl_hal::SimConfig;
use forcectl_kernel::ControllerConfig;

/// Name of the server executable started by the shell.
pub const SERVER_BINARY_NAME: &str = "forcectl-server";

/// Persisted configuration shared by the shell and the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Loopback address the command server binds to.
    #[serde(default = "default_server_ip")]
    pub server_ip: String,

    /// TCP port of the command server.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Network address of the force controller.
    #[serde(default = "default_device_ip")]
    pub device_ip: String,

    /// Driver channel addressed by every command.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Scope sample rate configured at startup.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,

    /// CSV file receiving force traces.
    #[serde(default = "default_trace_path")]
    pub trace_path: PathBuf,

    /// Directory for press plots.  Empty disables plotting.
    #[serde(default = "default_plot_dir")]
    pub plot_dir: String,

    /// Optional JSON-lines record of every served exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,

    /// Connect attempts per command before the shell gives up.
    #[serde(default = "default_client_max_attempts")]
    pub client_max_attempts: u32,

    /// Pause between refused connect attempts, in milliseconds.
    #[serde(default = "default_client_backoff_ms")]
    pub client_backoff_ms: u64,

    /// Server executable; defaults to `forcectl-server` next to the shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_binary: Option<PathBuf>,

    /// Contact surface position of the simulated controller (mm).
    #[serde(default = "default_sim_surface_position")]
    pub sim_surface_position: f64,
}

fn default_server_ip() -> String {
    forcectl_middleware::DEFAULT_IP.to_string()
}
fn default_server_port() -> u16 {
    forcectl_middleware::DEFAULT_PORT
}
fn default_device_ip() -> String {
    "192.168.250.254".to_string()
}
fn default_channel() -> String {
    "F1".to_string()
}
fn default_sample_rate_hz() -> u32 {
    250
}
fn default_trace_path() -> PathBuf {
    PathBuf::from("force_data.csv")
}
fn default_plot_dir() -> String {
    "plots".to_string()
}
fn default_client_max_attempts() -> u32 {
    forcectl_middleware::client::DEFAULT_MAX_ATTEMPTS
}
fn default_client_backoff_ms() -> u64 {
    1000
}
fn default_sim_surface_position() -> f64 {
    SimConfig::default().surface_position
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_ip: default_server_ip(),
            server_port: default_server_port(),
            device_ip: default_device_ip(),
            channel: default_channel(),
            sample_rate_hz: default_sample_rate_hz(),
            trace_path: default_trace_path(),
            plot_dir: default_plot_dir(),
            journal_path: None,
            client_max_attempts: default_client_max_attempts(),
            client_backoff_ms: default_client_backoff_ms(),
            server_binary: None,
            sim_surface_position: default_sim_surface_position(),
        }
    }
}

impl Config {
    /// Socket address of the command server.
    pub fn server_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .server_ip
            .parse()
            .map_err(|e| format!("Invalid server_ip '{}': {}", self.server_ip, e))?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    pub fn client_backoff(&self) -> Duration {
        Duration::from_millis(self.client_backoff_ms)
    }

    /// Session settings handed to the force controller.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            channel: self.channel.clone(),
            sample_rate_hz: self.sample_rate_hz,
            trace_path: self.trace_path.clone(),
        }
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            surface_position: self.sim_surface_position,
            ..SimConfig::default()
        }
    }

    /// Plot directory, or `None` when plotting is disabled.
    pub fn plot_dir(&self) -> Option<PathBuf> {
        let dir = self.plot_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }

    /// Server executable to spawn: the configured one, else the sibling of
    /// `current_exe`.
    pub fn server_binary(&self, current_exe: &Path) -> PathBuf {
        match &self.server_binary {
            Some(path) => path.clone(),
            None => current_exe.with_file_name(format!(
                "{SERVER_BINARY_NAME}{}",
                std::env::consts::EXE_SUFFIX
            )),
        }
    }
}

/// Return the path to `~/.forcectl/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".forcectl").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Defaults with environment overrides applied, for when no file is usable.
pub fn from_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config from disk, falling back to [`from_env`] when the file is
/// absent or unreadable.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => from_env(),
        Err(e) => {
            eprintln!("Config error: {e} – using defaults");
            from_env()
        }
    }
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `FORCECTL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FORCECTL_SERVER_IP` | `server_ip` |
/// | `FORCECTL_SERVER_PORT` | `server_port` |
/// | `FORCECTL_DEVICE_IP` | `device_ip` |
/// | `FORCECTL_TRACE_PATH` | `trace_path` |
/// | `FORCECTL_SERVER_BINARY` | `server_binary` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides resolved through `lookup` (variable name → value).
pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("FORCECTL_SERVER_IP") {
        cfg.server_ip = v;
    }
    if let Some(v) = lookup("FORCECTL_SERVER_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server_port = port;
    }
    if let Some(v) = lookup("FORCECTL_DEVICE_IP") {
        cfg.device_ip = v;
    }
    if let Some(v) = lookup("FORCECTL_TRACE_PATH") {
        cfg.trace_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("FORCECTL_SERVER_BINARY") {
        cfg.server_binary = Some(PathBuf::from(v));
    }
}

/// Save the config to disk, creating `~/.forcectl/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
